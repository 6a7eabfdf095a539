//! Fixed-window request limiter over an external counter store.
//!
//! The limiter fails open: if the counter store errors or does not answer
//! within its timeout the request is allowed and the failure is logged.

use std::sync::Arc;
use std::time::Duration;

use crate::domain::models::{CounterStoreConfig, RateLimitConfig};
use crate::domain::ports::{CounterStore, CounterStoreError, CounterWindow};

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    /// Counted against the window
    Allowed,
    /// Quota used up; the window resets after `retry_after`.
    Denied {
        /// Time until the window resets.
        retry_after: Duration,
    },
}

impl RateDecision {
    /// True unless the quota was used up.
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }
}

/// Counter key for an identity and protected operation.
pub fn rate_limit_key(identity: &str, operation: &str) -> String {
    format!("rate_limit:{identity}:{operation}")
}

/// Per-identity, per-operation request quota.
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn CounterStore>,
    window: Duration,
    default_limit: u32,
    enabled: bool,
    store_timeout: Duration,
}

impl RateLimiter {
    /// Limiter over `store`, with store calls bounded by `store_config.timeout_ms`.
    pub fn new(store: Arc<dyn CounterStore>, config: &RateLimitConfig, store_config: &CounterStoreConfig) -> Self {
        Self {
            store,
            window: Duration::from_secs(config.window_secs),
            default_limit: config.requests_per_minute,
            enabled: config.enabled,
            store_timeout: Duration::from_millis(store_config.timeout_ms),
        }
    }

    /// Requests per window allowed when the caller names no quota.
    pub fn default_limit(&self) -> u32 {
        self.default_limit
    }

    /// Count a request against `identity`/`operation`.
    ///
    /// Denied requests are not counted. The check and the increment are two
    /// store calls, so concurrent callers may overshoot the limit slightly.
    pub async fn check_and_increment(&self, identity: &str, operation: &str, limit: u32) -> RateDecision {
        if !self.enabled {
            return RateDecision::Allowed;
        }

        let key = rate_limit_key(identity, operation);
        match self.try_check_and_increment(&key, limit).await {
            Ok(decision) => {
                if let RateDecision::Denied { retry_after } = decision {
                    tracing::warn!(
                        identity,
                        operation,
                        limit,
                        retry_after_secs = retry_after.as_secs(),
                        "rate limit exceeded"
                    );
                }
                decision
            }
            Err(err) => {
                tracing::warn!(identity, operation, error = %err, "counter store failed, allowing request");
                RateDecision::Allowed
            }
        }
    }

    async fn try_check_and_increment(&self, key: &str, limit: u32) -> Result<RateDecision, CounterStoreError> {
        if let Some(window) = self.bounded(self.store.current(key)).await? {
            if window.count >= u64::from(limit) {
                return Ok(RateDecision::Denied { retry_after: retry_after(&window) });
            }
        }

        self.bounded(self.store.increment(key, self.window)).await?;
        Ok(RateDecision::Allowed)
    }

    async fn bounded<T>(
        &self,
        call: impl std::future::Future<Output = Result<T, CounterStoreError>>,
    ) -> Result<T, CounterStoreError> {
        tokio::time::timeout(self.store_timeout, call)
            .await
            .map_err(|_| CounterStoreError::Timeout(self.store_timeout))?
    }
}

/// Whole seconds until the window resets, at least one.
fn retry_after(window: &CounterWindow) -> Duration {
    let secs = window.expires_in.as_secs() + u64::from(window.expires_in.subsec_nanos() > 0);
    Duration::from_secs(secs.max(1))
}
