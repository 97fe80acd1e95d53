//! Type definitions for the command pipeline.

use crate::ports::store_error::StoreError;
use crate::use_cases::hierarchy_service::HierarchyError;
use hq_domain::{OperatorCommand, OrderId, OrderStatus, PipelineFailure};
use thiserror::Error;

/// Errors returned by the order-level entry points.
///
/// `submit_command` never returns one of these: its failures are recorded on
/// the returned trace instead.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    #[error("Order {id} is already {status}")]
    OrderClosed { id: OrderId, status: OrderStatus },

    #[error("Order {0} has no changes to apply")]
    NothingToApply(OrderId),

    #[error(transparent)]
    Hierarchy(#[from] HierarchyError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Input for [`CommandPipeline::submit_command`](super::CommandPipeline::submit_command)
#[derive(Debug, Clone)]
pub struct SubmitCommandInput {
    pub command: OperatorCommand,
    /// Per-request auto-approve override
    pub auto_approve: Option<bool>,
}

impl SubmitCommandInput {
    pub fn new(command: OperatorCommand) -> Self {
        Self {
            command,
            auto_approve: None,
        }
    }

    pub fn with_auto_approve(mut self, auto_approve: bool) -> Self {
        self.auto_approve = Some(auto_approve);
        self
    }
}

/// Why a run stopped before the end of the pipeline
#[derive(Debug, Clone)]
pub(super) enum Halt {
    /// Order becomes rejected (General failure, missing General, abort)
    Reject(PipelineFailure),
    /// Order stays pending with the failure recorded as its error
    Hold(PipelineFailure),
}

impl Halt {
    pub(super) fn failure(&self) -> &PipelineFailure {
        match self {
            Halt::Reject(f) | Halt::Hold(f) => f,
        }
    }
}
