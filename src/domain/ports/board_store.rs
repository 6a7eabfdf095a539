//! State store port for agents and tasks.
//!
//! All claim and completion work goes through a [`BoardTransaction`], which
//! is rolled back when dropped without [`BoardTransaction::commit`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Agent, Task, TaskStatus};

/// A conditional task write: applied only while the stored row still has
/// status `from` (and, when completing, the same assignee).
#[derive(Debug, Clone, PartialEq)]
pub enum TaskTransition {
    /// Open to claimed, assigning `agent_id`.
    Claim {
        /// Task to claim.
        task_id: Uuid,
        /// Claimant.
        agent_id: Uuid,
        /// Stored as `claimed_at`.
        at: DateTime<Utc>,
    },
    /// Claimed to complete, only by the assignee.
    Complete {
        /// Task to complete.
        task_id: Uuid,
        /// Must match the stored assignee.
        agent_id: Uuid,
        /// Work product.
        output: serde_json::Value,
        /// Stored as `completed_at`.
        at: DateTime<Utc>,
    },
}

impl TaskTransition {
    /// Task the write targets.
    pub fn task_id(&self) -> Uuid {
        match self {
            Self::Claim { task_id, .. } | Self::Complete { task_id, .. } => *task_id,
        }
    }

    /// Agent acting on the task.
    pub fn agent_id(&self) -> Uuid {
        match self {
            Self::Claim { agent_id, .. } | Self::Complete { agent_id, .. } => *agent_id,
        }
    }

    /// Status the stored task must have for the write to apply.
    pub fn from(&self) -> TaskStatus {
        match self {
            Self::Claim { .. } => TaskStatus::Open,
            Self::Complete { .. } => TaskStatus::Claimed,
        }
    }

    /// Status written when the guard matches.
    pub fn to(&self) -> TaskStatus {
        match self {
            Self::Claim { .. } => TaskStatus::Claimed,
            Self::Complete { .. } => TaskStatus::Complete,
        }
    }
}

/// Result of registering an agent by codename.
#[derive(Debug, Clone)]
pub struct AgentUpsert {
    /// The stored agent after the upsert.
    pub agent: Agent,
    /// False when an existing agent was refreshed.
    pub created: bool,
}

/// One unit of work against the state store.
#[async_trait]
pub trait BoardTransaction: Send {
    /// Apply a conditional transition. Returns the updated task, or `None`
    /// when the guard did not match and nothing was written.
    async fn transition_task(&mut self, transition: &TaskTransition) -> DomainResult<Option<Task>>;

    /// Read a task inside the transaction.
    async fn get_task(&mut self, id: Uuid) -> DomainResult<Option<Task>>;

    /// Read an agent inside the transaction.
    async fn get_agent(&mut self, id: Uuid) -> DomainResult<Option<Agent>>;

    /// Persist the agent's ledger fields if its stored `ledger_version`
    /// still equals `expected_version`. Returns false otherwise.
    async fn update_agent_ledger(&mut self, agent: &Agent, expected_version: u64) -> DomainResult<bool>;

    /// Make every write visible. Dropping without committing rolls back.
    async fn commit(self: Box<Self>) -> DomainResult<()>;
}

/// Durable storage for agents and tasks.
#[async_trait]
pub trait BoardStore: Send + Sync {
    /// Open a transaction scoped to a single board operation.
    async fn begin(&self) -> DomainResult<Box<dyn BoardTransaction>>;

    /// Insert `candidate`, or refresh the profile and heartbeat of the agent
    /// that already owns its codename. Ledger fields are never overwritten.
    async fn upsert_agent(&self, candidate: &Agent) -> DomainResult<AgentUpsert>;

    /// Agent by id.
    async fn get_agent(&self, id: Uuid) -> DomainResult<Option<Agent>>;

    /// All agents, newest first.
    async fn list_agents(&self) -> DomainResult<Vec<Agent>>;

    /// Store a newly created task.
    async fn insert_task(&self, task: &Task) -> DomainResult<()>;

    /// Task by id.
    async fn get_task(&self, id: Uuid) -> DomainResult<Option<Task>>;

    /// Every task still open.
    async fn list_open_tasks(&self) -> DomainResult<Vec<Task>>;
}
