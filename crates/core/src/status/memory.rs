//! In-memory status store with lazy expiry and a background sweep.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

use super::store::{StatusKey, StatusStore, StatusStoreError, StatusValue};

struct Entry {
    value: StatusValue,
    /// `None` when the TTL runs past what the clock can represent.
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

/// Process-local [`StatusStore`].
///
/// Expired entries are never returned; they are physically removed by
/// [`MemoryStatusStore::purge_expired`], usually from [`spawn_sweeper`].
///
/// [`spawn_sweeper`]: MemoryStatusStore::spawn_sweeper
#[derive(Default)]
pub struct MemoryStatusStore {
    entries: RwLock<HashMap<StatusKey, Entry>>,
}

impl MemoryStatusStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries held, expired or not.
    pub fn len(&self) -> usize {
        self.entries.read().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Periodically drops expired entries until the returned handle is aborted.
    pub fn spawn_sweeper(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(1)));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let removed = self.purge_expired();
                if removed > 0 {
                    debug!(removed, "swept expired status entries");
                }
            }
        })
    }
}

impl StatusStore for MemoryStatusStore {
    fn set(&self, key: StatusKey, value: StatusValue, ttl: Duration) -> Result<(), StatusStoreError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|e| StatusStoreError::Backend(format!("lock poisoned: {}", e)))?;
        entries.insert(
            key,
            Entry {
                value,
                expires_at: Instant::now().checked_add(ttl),
            },
        );
        Ok(())
    }

    fn get(&self, key: &StatusKey) -> Result<Option<StatusValue>, StatusStoreError> {
        let entries = self
            .entries
            .read()
            .map_err(|e| StatusStoreError::Backend(format!("lock poisoned: {}", e)))?;
        let now = Instant::now();
        Ok(entries
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value.clone()))
    }

    fn purge_expired(&self) -> usize {
        let Ok(mut entries) = self.entries.write() else {
            return 0;
        };
        let now = Instant::now();
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live(now));
        before - entries.len()
    }
}
