//! Domain errors for the Phoenix task board.

use thiserror::Error;
use uuid::Uuid;

use crate::domain::models::TaskStatus;

/// Domain-level errors that can occur while coordinating the board.
///
/// `Conflict` and `NotAssigned` are ordinary outcomes of agents competing
/// for work. `Unavailable` is the only variant where the outcome of a
/// mutating call is unknown.
#[derive(Debug, Error)]
pub enum DomainError {
    /// Caller input was rejected before touching state.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Unknown agent id.
    #[error("Agent not found: {0}")]
    AgentNotFound(Uuid),

    /// Unknown task id.
    #[error("Task not found: {0}")]
    TaskNotFound(Uuid),

    /// Another agent won the claim, or the task was no longer open.
    #[error("Task {task_id} already claimed or not open")]
    Conflict {
        /// Contested task.
        task_id: Uuid,
    },

    /// Completion attempted by an agent other than the claimant.
    #[error("Task {task_id} not assigned to agent {agent_id}")]
    NotAssigned {
        /// Task being completed.
        task_id: Uuid,
        /// Caller that does not hold the claim.
        agent_id: Uuid,
    },

    /// Completion attempted on a task that is not claimed.
    #[error("Task {task_id} is {status}, expected claimed")]
    InvalidState {
        /// Task being completed.
        task_id: Uuid,
        /// Status found instead of claimed.
        status: TaskStatus,
    },

    /// Quota for this identity and operation is used up.
    #[error("Rate limit exceeded for {operation}. Try again in {retry_after_secs} seconds")]
    RateLimited {
        /// Operation name from the rate-limit key.
        operation: String,
        /// Seconds until the window resets.
        retry_after_secs: u64,
    },

    /// Store timed out or was unreachable.
    #[error("State store unavailable: {0}")]
    Unavailable(String),

    /// Store rejected the query.
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// Stored data did not decode.
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// Result alias for board operations.
pub type DomainResult<T> = Result<T, DomainError>;

impl DomainError {
    /// Whether a caller may retry after re-checking current state.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }

    /// Whether the error is a normal loss in competition with other agents.
    pub fn is_contention(&self) -> bool {
        matches!(self, Self::Conflict { .. } | Self::NotAssigned { .. })
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::AgentNotFound(_) => "AGENT_NOT_FOUND",
            Self::TaskNotFound(_) => "TASK_NOT_FOUND",
            Self::Conflict { .. } => "CONFLICT",
            Self::NotAssigned { .. } => "NOT_ASSIGNED",
            Self::InvalidState { .. } => "INVALID_STATE",
            Self::RateLimited { .. } => "RATE_LIMITED",
            Self::Unavailable(_) => "UNAVAILABLE",
            Self::DatabaseError(_) => "DATABASE_ERROR",
            Self::SerializationError(_) => "SERIALIZATION_ERROR",
        }
    }
}

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed
            | sqlx::Error::Io(_) => DomainError::Unavailable(err.to_string()),
            sqlx::Error::Database(db) if is_busy(db.code().as_deref()) => {
                DomainError::Unavailable(err.to_string())
            }
            _ => DomainError::DatabaseError(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::SerializationError(err.to_string())
    }
}

/// SQLITE_BUSY (5) and SQLITE_LOCKED (6), including extended codes.
fn is_busy(code: Option<&str>) -> bool {
    code.and_then(|c| c.parse::<i32>().ok())
        .is_some_and(|c| matches!(c & 0xff, 5 | 6))
}
