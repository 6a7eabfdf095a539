//! SQLite-backed counter store for deployments with several board processes.
//!
//! Counters live in their own database file so rate limiting never contends
//! with the board's write lock. Expiry is stored as unix milliseconds.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;

use crate::domain::ports::{CounterStore, CounterStoreError, CounterWindow};

/// Counter store backed by a SQLite table with per-row expiry.
#[derive(Clone)]
pub struct SqliteCounterStore {
    pool: SqlitePool,
}

impl SqliteCounterStore {
    /// Store over a pool whose schema is already migrated.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Remove expired counters. Returns the number of rows deleted.
    pub async fn purge_expired(&self) -> Result<u64, CounterStoreError> {
        let now = Utc::now().timestamp_millis();
        let result = sqlx::query("DELETE FROM rate_counters WHERE expires_at <= ?")
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

fn window_from_row(count: i64, expires_at: i64, now: i64) -> CounterWindow {
    let remaining = u64::try_from(expires_at.saturating_sub(now)).unwrap_or(0);
    CounterWindow {
        count: u64::try_from(count).unwrap_or(0),
        expires_in: Duration::from_millis(remaining),
    }
}

#[async_trait]
impl CounterStore for SqliteCounterStore {
    async fn current(&self, key: &str) -> Result<Option<CounterWindow>, CounterStoreError> {
        let now = Utc::now().timestamp_millis();
        let row: Option<(i64, i64)> = sqlx::query_as(
            "SELECT count, expires_at FROM rate_counters WHERE key = ? AND expires_at > ?",
        )
        .bind(key)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(count, expires_at)| window_from_row(count, expires_at, now)))
    }

    async fn increment(&self, key: &str, window: Duration) -> Result<CounterWindow, CounterStoreError> {
        let now = Utc::now().timestamp_millis();
        let window_ms = i64::try_from(window.as_millis()).unwrap_or(i64::MAX);
        let new_expiry = now.saturating_add(window_ms);

        // An expired row restarts at 1 with a fresh expiry.
        let (count, expires_at): (i64, i64) = sqlx::query_as(
            r#"INSERT INTO rate_counters (key, count, expires_at) VALUES (?, 1, ?)
               ON CONFLICT(key) DO UPDATE SET
                   count = CASE WHEN rate_counters.expires_at <= ? THEN 1 ELSE rate_counters.count + 1 END,
                   expires_at = CASE WHEN rate_counters.expires_at <= ? THEN ? ELSE rate_counters.expires_at END
               RETURNING count, expires_at"#,
        )
        .bind(key)
        .bind(new_expiry)
        .bind(now)
        .bind(now)
        .bind(new_expiry)
        .fetch_one(&self.pool)
        .await?;

        Ok(window_from_row(count, expires_at, now))
    }
}
