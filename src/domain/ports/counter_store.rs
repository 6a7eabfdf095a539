//! Counter store port used by the rate limiter.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Failures reported by a counter store.
#[derive(Debug, Error)]
pub enum CounterStoreError {
    /// Backend could not be reached.
    #[error("Counter store unreachable: {0}")]
    Unreachable(String),

    /// Call exceeded its budget.
    #[error("Counter store timed out after {0:?}")]
    Timeout(Duration),

    /// Backend rejected the operation.
    #[error("Counter store query failed: {0}")]
    Query(String),
}

impl From<sqlx::Error> for CounterStoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                Self::Unreachable(err.to_string())
            }
            other => Self::Query(other.to_string()),
        }
    }
}

/// Live counter for one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterWindow {
    /// Hits recorded in the current window.
    pub count: u64,
    /// Time until the counter expires and resets.
    pub expires_in: Duration,
}

/// Ephemeral counters with per-key expiry.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Current window for `key`, or `None` if absent or expired.
    async fn current(&self, key: &str) -> Result<Option<CounterWindow>, CounterStoreError>;

    /// Increment `key`. The first increment of a fresh window starts a new
    /// counter that expires after `window`; later ones keep the expiry.
    async fn increment(&self, key: &str, window: Duration) -> Result<CounterWindow, CounterStoreError>;
}
