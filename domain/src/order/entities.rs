//! Order entity and its lifecycle

use super::change::ProposedChange;
use crate::core::error::DomainError;
use crate::delegation::DelegationProvenance;
use crate::hierarchy::value_objects::AgentId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier of an order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(Uuid);

impl OrderId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for OrderId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for OrderId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl std::str::FromStr for OrderId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

impl std::fmt::Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Status of an order
///
/// ```text
/// pending ──► approved ──► executed
///    │
///    └──────► rejected
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    Pending,
    /// Approved by the operator, commit in progress
    Approved,
    Rejected,
    Executed,
}

impl OrderStatus {
    pub fn as_str(&self) -> &str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Approved => "approved",
            OrderStatus::Rejected => "rejected",
            OrderStatus::Executed => "executed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Rejected | OrderStatus::Executed)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(OrderStatus::Pending),
            "approved" => Ok(OrderStatus::Approved),
            "rejected" => Ok(OrderStatus::Rejected),
            "executed" => Ok(OrderStatus::Executed),
            other => Err(DomainError::UnknownOrderStatus(other.to_string())),
        }
    }
}

/// One end-to-end run of the command pipeline (Entity)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub command: String,
    pub general_reply: Option<String>,
    pub lieutenant_id: Option<AgentId>,
    pub delegation_provenance: Option<DelegationProvenance>,
    pub forwarded_order: Option<String>,
    pub lieutenant_reply: Option<String>,
    pub affected_agents: Vec<AgentId>,
    pub changes: Vec<ProposedChange>,
    pub status: OrderStatus,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub executed_at: Option<DateTime<Utc>>,
}

impl Order {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            id: OrderId::new(),
            command: command.into(),
            general_reply: None,
            lieutenant_id: None,
            delegation_provenance: None,
            forwarded_order: None,
            lieutenant_reply: None,
            affected_agents: Vec::new(),
            changes: Vec::new(),
            status: OrderStatus::Pending,
            error: None,
            created_at: Utc::now(),
            executed_at: None,
        }
    }

    /// Whether the order can still be approved or rejected
    pub fn is_open(&self) -> bool {
        !self.status.is_terminal()
    }
}

/// Partial update of an order; `None` fields are left untouched
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderUpdate {
    pub general_reply: Option<String>,
    pub lieutenant_id: Option<AgentId>,
    pub delegation_provenance: Option<DelegationProvenance>,
    pub forwarded_order: Option<String>,
    pub lieutenant_reply: Option<String>,
    pub affected_agents: Option<Vec<AgentId>>,
    pub changes: Option<Vec<ProposedChange>>,
    pub status: Option<OrderStatus>,
    pub error: Option<String>,
    pub executed_at: Option<DateTime<Utc>>,
}

impl OrderUpdate {
    pub fn status(status: OrderStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn rejected(error: impl Into<String>) -> Self {
        Self {
            status: Some(OrderStatus::Rejected),
            error: Some(error.into()),
            ..Default::default()
        }
    }

    pub fn executed(at: DateTime<Utc>) -> Self {
        Self {
            status: Some(OrderStatus::Executed),
            executed_at: Some(at),
            ..Default::default()
        }
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Merge this update into `order`
    pub fn apply_to(self, order: &mut Order) {
        if let Some(v) = self.general_reply {
            order.general_reply = Some(v);
        }
        if let Some(v) = self.lieutenant_id {
            order.lieutenant_id = Some(v);
        }
        if let Some(v) = self.delegation_provenance {
            order.delegation_provenance = Some(v);
        }
        if let Some(v) = self.forwarded_order {
            order.forwarded_order = Some(v);
        }
        if let Some(v) = self.lieutenant_reply {
            order.lieutenant_reply = Some(v);
        }
        if let Some(v) = self.affected_agents {
            order.affected_agents = v;
        }
        if let Some(v) = self.changes {
            order.changes = v;
        }
        if let Some(v) = self.status {
            order.status = v;
        }
        if let Some(v) = self.error {
            order.error = Some(v);
        }
        if let Some(v) = self.executed_at {
            order.executed_at = Some(v);
        }
    }
}
