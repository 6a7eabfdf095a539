//! Process-local counter store.
//!
//! Uses the tokio clock, so expiry follows `tokio::time::pause` and
//! `advance` in tests. Expired entries are dropped lazily on access and by
//! [`InMemoryCounterStore::sweep`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::domain::ports::{CounterStore, CounterStoreError, CounterWindow};

#[derive(Debug, Clone, Copy)]
struct Entry {
    count: u64,
    expires_at: Instant,
}

impl Entry {
    fn window(&self, now: Instant) -> CounterWindow {
        CounterWindow {
            count: self.count,
            expires_in: self.expires_at.saturating_duration_since(now),
        }
    }
}

/// Process-local counters. Expired windows are reset on access and dropped
/// by [`InMemoryCounterStore::sweep`].
#[derive(Clone, Default)]
pub struct InMemoryCounterStore {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
}

impl InMemoryCounterStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop expired entries. Returns how many were removed.
    pub async fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        before - entries.len()
    }
}

#[async_trait]
impl CounterStore for InMemoryCounterStore {
    async fn current(&self, key: &str) -> Result<Option<CounterWindow>, CounterStoreError> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        match entries.get(key) {
            Some(entry) if entry.expires_at > now => Ok(Some(entry.window(now))),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn increment(&self, key: &str, window: Duration) -> Result<CounterWindow, CounterStoreError> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        let entry = entries
            .entry(key.to_string())
            .and_modify(|entry| {
                if entry.expires_at <= now {
                    *entry = Entry { count: 0, expires_at: now + window };
                }
            })
            .or_insert(Entry { count: 0, expires_at: now + window });
        entry.count += 1;
        Ok(entry.window(now))
    }
}
