//! Lease-based lock coordinator for a single process.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::sync::futures::OwnedNotified;
use tokio::time::Instant;
use tracing::trace;
use uuid::Uuid;

use crate::error::BackendError;
use crate::traits::{Lease, LockCoordinator};

#[derive(Debug)]
struct Holder {
    token: String,
    expires_at: Instant,
    /// Wakes the waiters of this key only.
    released: Arc<Notify>,
}

/// A lock that is currently held by someone else.
struct Busy {
    expires_at: Instant,
    released: OwnedNotified,
}

/// Lock coordinator keeping leases in memory.
///
/// Waiters park on the holder's [`Notify`] and wake when that lock is released
/// or when its lease runs out, whichever comes first. An expired lease is
/// taken over by the next acquirer without the old holder's cooperation.
#[derive(Debug, Default)]
pub struct InMemoryLockCoordinator {
    held: Mutex<HashMap<String, Holder>>,
}

impl InMemoryLockCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if `lock_key` is held by a live lease.
    pub fn is_locked(&self, lock_key: &str) -> bool {
        let now = Instant::now();
        self.held
            .lock()
            .get(lock_key)
            .is_some_and(|h| h.expires_at > now)
    }

    /// Number of live leases. Expired ones are dropped on the way.
    pub fn held_count(&self) -> usize {
        let mut held = self.held.lock();
        prune_expired(&mut held, Instant::now());
        held.len()
    }

    /// Grants the lock if free or expired; otherwise returns when the current
    /// lease ends together with a wakeup registered on its release.
    fn try_take(&self, lock_key: &str, lease: Duration) -> Result<Lease, Busy> {
        let mut held = self.held.lock();
        let now = Instant::now();

        if let Some(holder) = held.get(lock_key)
            && holder.expires_at > now
        {
            // Created under the map lock, so a release after this point wakes it.
            return Err(Busy {
                expires_at: holder.expires_at,
                released: Arc::clone(&holder.released).notified_owned(),
            });
        }

        // Crashed holders never release; drop their leases here.
        prune_expired(&mut held, now);

        let token = Uuid::now_v7().to_string();
        held.insert(
            lock_key.to_string(),
            Holder {
                token: token.clone(),
                expires_at: now + lease,
                released: Arc::new(Notify::new()),
            },
        );

        Ok(Lease::new(lock_key, token, lease))
    }
}

fn prune_expired(held: &mut HashMap<String, Holder>, now: Instant) {
    held.retain(|_, holder| holder.expires_at > now);
}

#[async_trait]
impl LockCoordinator for InMemoryLockCoordinator {
    async fn try_acquire(
        &self,
        lock_key: &str,
        wait: Duration,
        lease: Duration,
    ) -> Result<Option<Lease>, BackendError> {
        let deadline = Instant::now() + wait;

        loop {
            match self.try_take(lock_key, lease) {
                Ok(granted) => {
                    trace!(key = %lock_key, "Lock acquired");
                    return Ok(Some(granted));
                },
                Err(busy) => {
                    if Instant::now() >= deadline {
                        trace!(key = %lock_key, "Lock wait timed out");
                        return Ok(None);
                    }
                    let wake_at = deadline.min(busy.expires_at);
                    let _ = tokio::time::timeout_at(wake_at, busy.released).await;
                },
            }
        }
    }

    async fn release(&self, lease: Lease) -> Result<(), BackendError> {
        let released = {
            let mut held = self.held.lock();
            let now = Instant::now();
            match held.get(lease.key()) {
                Some(holder) if holder.token == lease.token() && holder.expires_at > now => {
                    held.remove(lease.key()).map(|holder| holder.released)
                },
                _ => None,
            }
        };

        let Some(released) = released else {
            return Err(BackendError::LeaseLost {
                key: lease.key().to_string(),
            });
        };

        trace!(key = %lease.key(), "Lock released");
        released.notify_waiters();
        Ok(())
    }

    fn name(&self) -> &str {
        "in-memory"
    }
}
