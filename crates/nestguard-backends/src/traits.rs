//! Interfaces of the backing store, cache backend and lock coordinator.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::{BackendError, StoreError};

/// Authoritative key → entity lookup.
///
/// # Example
///
/// ```ignore
/// use nestguard_backends::{BackingStore, StoreError};
///
/// struct ListingTable { /* connection pool */ }
///
/// #[async_trait]
/// impl BackingStore<Listing> for ListingTable {
///     async fn fetch_by_id(&self, id: &str) -> Result<Option<Listing>, StoreError> {
///         // SELECT ... WHERE id = $1
///     }
///
///     async fn list_all_keys(&self) -> Result<Vec<String>, StoreError> {
///         // SELECT id FROM listings
///     }
///
///     fn name(&self) -> &str {
///         "postgres"
///     }
/// }
/// ```
#[async_trait]
pub trait BackingStore<V: Send>: Send + Sync {
    /// Fetches one entity. `Ok(None)` means the store confirmed it does not exist.
    ///
    /// # Errors
    ///
    /// Any `StoreError` is propagated to the lookup caller.
    async fn fetch_by_id(&self, id: &str) -> Result<Option<V>, StoreError>;

    /// Enumerates every valid key.
    ///
    /// Only called when the membership filter is built, so implementations
    /// should project to keys instead of loading full rows.
    async fn list_all_keys(&self) -> Result<Vec<String>, StoreError>;

    /// Returns the name of this store, for logging.
    fn name(&self) -> &str;
}

/// String-keyed byte store with per-entry TTL.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Reads a live entry.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BackendError>;

    /// Writes an entry that expires after `ttl`. Overwrites replace the TTL.
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), BackendError>;

    /// Removes an entry. Returns whether one was present.
    async fn delete(&self, key: &str) -> Result<bool, BackendError>;

    /// Returns whether a live entry exists.
    async fn exists(&self, key: &str) -> Result<bool, BackendError>;

    /// Remaining time to live of an entry, `None` if it does not exist.
    async fn ttl(&self, key: &str) -> Result<Option<Duration>, BackendError>;

    /// Removes every entry whose key matches the glob `pattern`.
    /// Returns how many entries were removed.
    async fn delete_matching(&self, pattern: &str) -> Result<usize, BackendError>;

    /// Returns the name of this backend, for logging.
    fn name(&self) -> &str;
}

/// Exclusive ownership of a lock key until released or until the lease ends.
///
/// Releasing consumes the lease, so a released lease cannot be released again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lease {
    key: String,
    token: String,
    duration: Duration,
}

impl Lease {
    /// Creates a lease record. Called by coordinators when granting a lock.
    pub fn new(key: impl Into<String>, token: impl Into<String>, duration: Duration) -> Self {
        Self {
            key: key.into(),
            token: token.into(),
            duration,
        }
    }

    /// The lock key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Token identifying this holder; release is refused for any other token.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Auto-expiry duration granted at acquisition.
    pub fn duration(&self) -> Duration {
        self.duration
    }
}

/// Cluster-wide mutual exclusion with bounded wait and bounded lease.
#[async_trait]
pub trait LockCoordinator: Send + Sync {
    /// Waits up to `wait` for `lock_key`. On success the lock is held until
    /// released or until `lease` elapses, whichever comes first.
    ///
    /// Returns `Ok(None)` if the wait timed out.
    ///
    /// # Errors
    ///
    /// `BackendError` if the coordinator itself failed.
    async fn try_acquire(
        &self,
        lock_key: &str,
        wait: Duration,
        lease: Duration,
    ) -> Result<Option<Lease>, BackendError>;

    /// Releases a held lease.
    ///
    /// # Errors
    ///
    /// `BackendError::LeaseLost` if the lease had already expired.
    async fn release(&self, lease: Lease) -> Result<(), BackendError>;

    /// Returns the name of this coordinator, for logging.
    fn name(&self) -> &str;
}
