//! SQLite store (rusqlite, bundled)
//!
//! Every multi-statement write runs in one transaction. Version numbers are
//! assigned inside the transaction as `MAX(version) + 1`, so concurrent
//! commits against the same agent can never collide.

use chrono::{DateTime, Utc};
use hq_application::{HierarchyRepository, NewPromptVersion, OrderRepository, StoreError};
use hq_domain::{
    Agent, AgentId, DomainError, DomainType, Model, NewAgent, Order, OrderId, OrderUpdate,
    PerformanceStats, PromptVersion, Rank,
};
use rusqlite::{Connection, OptionalExtension, Row, Transaction, params};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

const SCHEMA_SQL: &str = r#"
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS system_config (
    key   TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS agents (
    id             TEXT PRIMARY KEY,
    name           TEXT NOT NULL,
    rank           TEXT NOT NULL,
    domain_type    TEXT NOT NULL,
    parent_id      TEXT,
    active         INTEGER NOT NULL DEFAULT 1,
    model          TEXT,
    current_prompt TEXT NOT NULL,
    description    TEXT,
    created_at     TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS prompt_versions (
    agent_id   TEXT NOT NULL REFERENCES agents(id),
    version    INTEGER NOT NULL,
    text       TEXT NOT NULL,
    notes      TEXT NOT NULL,
    author     TEXT NOT NULL,
    active     INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    stats      TEXT,
    PRIMARY KEY (agent_id, version)
);

CREATE TABLE IF NOT EXISTS orders (
    id         TEXT PRIMARY KEY,
    status     TEXT NOT NULL,
    created_at TEXT NOT NULL,
    body       TEXT NOT NULL
);
"#;

const AGENT_COLUMNS: &str =
    "id, name, rank, domain_type, parent_id, active, model, current_prompt, description, created_at";

const VERSION_COLUMNS: &str = "agent_id, version, text, notes, author, active, created_at, stats";

fn backend(e: rusqlite::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

fn parse_time(value: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::Serialization(format!("bad timestamp '{}': {}", value, e)))
}

/// Raw `agents` row; converted outside the rusqlite row callback
struct AgentRow {
    id: String,
    name: String,
    rank: String,
    domain_type: String,
    parent_id: Option<String>,
    active: bool,
    model: Option<String>,
    current_prompt: String,
    description: Option<String>,
    created_at: String,
}

impl AgentRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            rank: row.get(2)?,
            domain_type: row.get(3)?,
            parent_id: row.get(4)?,
            active: row.get(5)?,
            model: row.get(6)?,
            current_prompt: row.get(7)?,
            description: row.get(8)?,
            created_at: row.get(9)?,
        })
    }

    fn into_agent(self) -> Result<Agent, StoreError> {
        let rank: Rank = self
            .rank
            .parse()
            .map_err(|e: DomainError| StoreError::Serialization(e.to_string()))?;
        let Ok(domain_type) = self.domain_type.parse::<DomainType>();
        let model = self.model.map(|m| {
            let Ok(model) = m.parse::<Model>();
            model
        });
        Ok(Agent {
            id: AgentId::new(self.id),
            name: self.name,
            rank,
            domain_type,
            parent_id: self.parent_id.map(AgentId::new),
            active: self.active,
            model,
            current_prompt: self.current_prompt,
            description: self.description,
            created_at: parse_time(&self.created_at)?,
        })
    }
}

struct VersionRow {
    agent_id: String,
    version: u32,
    text: String,
    notes: String,
    author: String,
    active: bool,
    created_at: String,
    stats: Option<String>,
}

impl VersionRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            agent_id: row.get(0)?,
            version: row.get(1)?,
            text: row.get(2)?,
            notes: row.get(3)?,
            author: row.get(4)?,
            active: row.get(5)?,
            created_at: row.get(6)?,
            stats: row.get(7)?,
        })
    }

    fn into_version(self) -> Result<PromptVersion, StoreError> {
        let stats = self
            .stats
            .as_deref()
            .map(serde_json::from_str::<PerformanceStats>)
            .transpose()?;
        Ok(PromptVersion {
            agent_id: AgentId::new(self.agent_id),
            version: self.version,
            text: self.text,
            notes: self.notes,
            author: self.author,
            active: self.active,
            created_at: parse_time(&self.created_at)?,
            stats,
        })
    }
}

/// File-backed store; one connection guarded by a mutex
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database at `path` and apply the schema
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Backend(format!("cannot create {}: {}", parent.display(), e))
            })?;
        }
        debug!("Opening SQLite store at {}", path.display());
        Self::init(Connection::open(path).map_err(backend)?)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory().map_err(backend)?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA_SQL).map_err(backend)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Backend("sqlite connection lock poisoned".to_string()))
    }
}

fn agent_exists(conn: &Connection, id: &AgentId) -> Result<bool, StoreError> {
    conn.query_row("SELECT 1 FROM agents WHERE id = ?1", params![id.as_str()], |_| Ok(()))
        .optional()
        .map(|found| found.is_some())
        .map_err(backend)
}

/// Flip `version` to the single active one and mirror its text onto the agent
fn activate_in(tx: &Transaction<'_>, id: &AgentId, version: u32) -> Result<PromptVersion, StoreError> {
    let row = tx
        .query_row(
            &format!(
                "SELECT {} FROM prompt_versions WHERE agent_id = ?1 AND version = ?2",
                VERSION_COLUMNS
            ),
            params![id.as_str(), version],
            VersionRow::read,
        )
        .optional()
        .map_err(backend)?
        .ok_or_else(|| StoreError::NotFound(format!("{} v{}", id, version)))?;

    tx.execute(
        "UPDATE prompt_versions SET active = (version = ?2) WHERE agent_id = ?1",
        params![id.as_str(), version],
    )
    .map_err(backend)?;
    tx.execute(
        "UPDATE agents SET current_prompt = ?2 WHERE id = ?1",
        params![id.as_str(), row.text],
    )
    .map_err(backend)?;

    let mut active = row.into_version()?;
    active.active = true;
    Ok(active)
}

fn read_order(conn: &Connection, id: &OrderId) -> Result<Option<Order>, StoreError> {
    let body: Option<String> = conn
        .query_row(
            "SELECT body FROM orders WHERE id = ?1",
            params![id.to_string()],
            |row| row.get(0),
        )
        .optional()
        .map_err(backend)?;
    Ok(body.map(|b| serde_json::from_str(&b)).transpose()?)
}

impl HierarchyRepository for SqliteStore {
    fn get_config(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.conn()?
            .query_row(
                "SELECT value FROM system_config WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .map_err(backend)
    }

    fn set_config(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.conn()?
            .execute(
                "INSERT INTO system_config (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![key, value],
            )
            .map_err(backend)?;
        Ok(())
    }

    fn list_config(&self) -> Result<Vec<(String, String)>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT key, value FROM system_config ORDER BY key")
            .map_err(backend)?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
            .map_err(backend)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(backend)?;
        Ok(rows)
    }

    fn list_agents(&self) -> Result<Vec<Agent>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!("SELECT {} FROM agents ORDER BY id", AGENT_COLUMNS))
            .map_err(backend)?;
        let rows = stmt
            .query_map([], AgentRow::read)
            .map_err(backend)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(backend)?;
        rows.into_iter().map(AgentRow::into_agent).collect()
    }

    fn get_agent(&self, id: &AgentId) -> Result<Option<Agent>, StoreError> {
        let row = self
            .conn()?
            .query_row(
                &format!("SELECT {} FROM agents WHERE id = ?1", AGENT_COLUMNS),
                params![id.as_str()],
                AgentRow::read,
            )
            .optional()
            .map_err(backend)?;
        row.map(AgentRow::into_agent).transpose()
    }

    fn insert_agent(&self, agent: &NewAgent, initial: NewPromptVersion) -> Result<Agent, StoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(backend)?;
        if agent_exists(&tx, &agent.id)? {
            return Err(StoreError::AlreadyExists(agent.id.to_string()));
        }

        let now = Utc::now();
        let created_at = now.to_rfc3339();
        tx.execute(
            &format!(
                "INSERT INTO agents ({}) VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, ?7, ?8, ?9)",
                AGENT_COLUMNS
            ),
            params![
                agent.id.as_str(),
                agent.name,
                agent.rank.as_str(),
                agent.domain_type.as_str(),
                agent.parent_id.as_ref().map(|p| p.as_str()),
                agent.model.as_ref().map(|m| m.as_str()),
                initial.text,
                agent.description,
                created_at,
            ],
        )
        .map_err(backend)?;
        tx.execute(
            &format!(
                "INSERT INTO prompt_versions ({}) VALUES (?1, 1, ?2, ?3, ?4, 1, ?5, NULL)",
                VERSION_COLUMNS
            ),
            params![
                agent.id.as_str(),
                initial.text,
                initial.notes,
                initial.author,
                created_at
            ],
        )
        .map_err(backend)?;
        tx.commit().map_err(backend)?;

        let mut created = Agent::from_new(agent, now);
        created.current_prompt = initial.text;
        Ok(created)
    }

    fn set_agent_active(&self, id: &AgentId, active: bool) -> Result<bool, StoreError> {
        let changed = self
            .conn()?
            .execute(
                "UPDATE agents SET active = ?2 WHERE id = ?1",
                params![id.as_str(), active],
            )
            .map_err(backend)?;
        Ok(changed > 0)
    }

    fn update_agent_metadata(
        &self,
        id: &AgentId,
        name: Option<&str>,
        description: Option<&str>,
    ) -> Result<(), StoreError> {
        let changed = self
            .conn()?
            .execute(
                "UPDATE agents SET name = COALESCE(?2, name), description = COALESCE(?3, description)
                 WHERE id = ?1",
                params![id.as_str(), name, description],
            )
            .map_err(backend)?;
        if changed == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }

    fn append_prompt_version(
        &self,
        id: &AgentId,
        version: NewPromptVersion,
    ) -> Result<PromptVersion, StoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(backend)?;
        if !agent_exists(&tx, id)? {
            return Err(StoreError::NotFound(id.to_string()));
        }

        let next: u32 = tx
            .query_row(
                "SELECT COALESCE(MAX(version), 0) + 1 FROM prompt_versions WHERE agent_id = ?1",
                params![id.as_str()],
                |row| row.get(0),
            )
            .map_err(backend)?;
        tx.execute(
            &format!(
                "INSERT INTO prompt_versions ({}) VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6, NULL)",
                VERSION_COLUMNS
            ),
            params![
                id.as_str(),
                next,
                version.text,
                version.notes,
                version.author,
                Utc::now().to_rfc3339()
            ],
        )
        .map_err(backend)?;
        let active = activate_in(&tx, id, next)?;
        tx.commit().map_err(backend)?;
        Ok(active)
    }

    fn activate_prompt_version(
        &self,
        id: &AgentId,
        version: u32,
    ) -> Result<PromptVersion, StoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(backend)?;
        let active = activate_in(&tx, id, version)?;
        tx.commit().map_err(backend)?;
        Ok(active)
    }

    fn list_prompt_versions(&self, id: &AgentId) -> Result<Vec<PromptVersion>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM prompt_versions WHERE agent_id = ?1 ORDER BY version",
                VERSION_COLUMNS
            ))
            .map_err(backend)?;
        let rows = stmt
            .query_map(params![id.as_str()], VersionRow::read)
            .map_err(backend)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(backend)?;
        rows.into_iter().map(VersionRow::into_version).collect()
    }
}

impl OrderRepository for SqliteStore {
    fn insert_order(&self, order: &Order) -> Result<(), StoreError> {
        let body = serde_json::to_string(order)?;
        self.conn()?
            .execute(
                "INSERT INTO orders (id, status, created_at, body) VALUES (?1, ?2, ?3, ?4)",
                params![
                    order.id.to_string(),
                    order.status.as_str(),
                    order.created_at.to_rfc3339(),
                    body
                ],
            )
            .map_err(|e| match e {
                rusqlite::Error::SqliteFailure(err, _)
                    if err.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    StoreError::AlreadyExists(order.id.to_string())
                }
                other => backend(other),
            })?;
        Ok(())
    }

    fn update_order(&self, id: &OrderId, update: OrderUpdate) -> Result<Order, StoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(backend)?;
        let mut order =
            read_order(&tx, id)?.ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        update.apply_to(&mut order);

        tx.execute(
            "UPDATE orders SET status = ?2, body = ?3 WHERE id = ?1",
            params![
                id.to_string(),
                order.status.as_str(),
                serde_json::to_string(&order)?
            ],
        )
        .map_err(backend)?;
        tx.commit().map_err(backend)?;
        Ok(order)
    }

    fn get_order(&self, id: &OrderId) -> Result<Option<Order>, StoreError> {
        let conn = self.conn()?;
        read_order(&conn, id)
    }

    fn list_orders(&self, limit: usize) -> Result<Vec<Order>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT body FROM orders ORDER BY rowid DESC LIMIT ?1")
            .map_err(backend)?;
        let bodies = stmt
            .query_map(params![limit as i64], |row| row.get::<_, String>(0))
            .map_err(backend)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(backend)?;
        bodies
            .iter()
            .map(|b| serde_json::from_str(b).map_err(StoreError::from))
            .collect()
    }
}
