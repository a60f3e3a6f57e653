//! Per-resource exclusive locks.
//!
//! Each resource key gets its own lock, created lazily on first use and kept
//! for the lifetime of the registry. Waiters are served in the order they
//! reserved a ticket, so callers that reserve in arrival order are run in
//! arrival order.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, warn};

/// Registry of per-key locks.
#[derive(Default)]
pub struct LockRegistry {
    locks: Mutex<HashMap<String, Arc<KeyLock>>>,
}

impl LockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes a place in the queue for `key` without waiting.
    ///
    /// The map guard is only held to look up or create the key's lock.
    pub fn reserve(&self, key: &str) -> LockTicket {
        let lock = {
            let mut locks = lock_or_recover(&self.locks);
            Arc::clone(
                locks
                    .entry(key.to_string())
                    .or_insert_with(|| Arc::new(KeyLock::new())),
            )
        };
        let number = lock.issue();
        debug!(resource_key = key, ticket = number, "reserved lock ticket");
        LockTicket {
            key: key.to_string(),
            number,
            lock,
            armed: true,
        }
    }

    /// Reserves and waits in one call.
    pub async fn acquire(&self, key: &str) -> ResourceLock {
        self.reserve(key).acquire().await
    }

    /// Number of keys that have ever been locked.
    pub fn key_count(&self) -> usize {
        lock_or_recover(&self.locks).len()
    }

    /// Whether the lock for `key` is currently held or has waiters.
    pub fn is_contended(&self, key: &str) -> bool {
        let locks = lock_or_recover(&self.locks);
        locks.get(key).map(|lock| lock.is_busy()).unwrap_or(false)
    }
}

/// A place in a key's queue. Turn it into a held lock with [`LockTicket::acquire`].
///
/// Dropping a ticket without acquiring gives up the place; later tickets are
/// not blocked by it.
pub struct LockTicket {
    key: String,
    number: u64,
    lock: Arc<KeyLock>,
    armed: bool,
}

impl LockTicket {
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Waits until every earlier ticket for the same key has been released.
    pub async fn acquire(mut self) -> ResourceLock {
        let number = self.number;
        let mut turn = self.lock.turn.subscribe();
        // The sender lives inside the lock we hold, so this cannot fail.
        let _ = turn.wait_for(|serving| *serving == number).await;

        self.armed = false;
        debug!(resource_key = %self.key, ticket = number, "lock acquired");
        ResourceLock {
            key: std::mem::take(&mut self.key),
            lock: Some(Arc::clone(&self.lock)),
        }
    }
}

impl Drop for LockTicket {
    fn drop(&mut self) {
        if self.armed {
            debug!(resource_key = %self.key, ticket = self.number, "lock ticket abandoned");
            self.lock.abandon(self.number);
        }
    }
}

/// A held resource lock. Released on drop.
pub struct ResourceLock {
    key: String,
    lock: Option<Arc<KeyLock>>,
}

impl std::fmt::Debug for ResourceLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceLock")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

impl ResourceLock {
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Waits `cooldown` while still holding the lock, then releases it.
    ///
    /// The next holder of the same key cannot start before the cooldown ends.
    pub async fn release_after(self, cooldown: Duration) {
        if !cooldown.is_zero() {
            tokio::time::sleep(cooldown).await;
        }
        self.release();
    }

    pub fn release(mut self) {
        self.unlock();
    }

    fn unlock(&mut self) {
        if let Some(lock) = self.lock.take() {
            debug!(resource_key = %self.key, "lock released");
            lock.advance();
        }
    }
}

impl Drop for ResourceLock {
    fn drop(&mut self) {
        self.unlock();
    }
}

struct QueueState {
    next_ticket: u64,
    now_serving: u64,
    abandoned: BTreeSet<u64>,
}

struct KeyLock {
    state: Mutex<QueueState>,
    turn: watch::Sender<u64>,
}

impl KeyLock {
    fn new() -> Self {
        let (turn, _) = watch::channel(0);
        Self {
            state: Mutex::new(QueueState {
                next_ticket: 0,
                now_serving: 0,
                abandoned: BTreeSet::new(),
            }),
            turn,
        }
    }

    fn issue(&self) -> u64 {
        let mut state = lock_or_recover(&self.state);
        let number = state.next_ticket;
        state.next_ticket += 1;
        number
    }

    fn is_busy(&self) -> bool {
        let state = lock_or_recover(&self.state);
        state.next_ticket > state.now_serving
    }

    /// Hands the lock to the next ticket that has not been abandoned.
    fn advance(&self) {
        let mut state = lock_or_recover(&self.state);
        state.now_serving += 1;
        loop {
            let serving = state.now_serving;
            if !state.abandoned.remove(&serving) {
                break;
            }
            state.now_serving += 1;
        }
        self.turn.send_replace(state.now_serving);
    }

    fn abandon(&self, number: u64) {
        let is_current = {
            let mut state = lock_or_recover(&self.state);
            if number == state.now_serving {
                true
            } else {
                if number > state.now_serving {
                    state.abandoned.insert(number);
                }
                false
            }
        };
        if is_current {
            self.advance();
        }
    }
}

fn lock_or_recover<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| {
        warn!("lock registry mutex poisoned, recovering");
        poisoned.into_inner()
    })
}
