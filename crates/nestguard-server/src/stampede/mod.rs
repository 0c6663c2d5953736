//! Per-key single-flight protection for cache misses.
//!
//! On a miss for a hot key, at most one caller cluster-wide fetches from the
//! backing store while the others wait on the lock and then read what it
//! cached. The guard trades perfect de-duplication for availability: a wait
//! that times out or a coordinator that fails both fall back to a direct
//! fetch instead of failing the lookup.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use nestguard_backends::{Lease, LockCoordinator, StoreError};
use nestguard_core::{CacheKey, GuardPath, LockSettings};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::cache::CacheLayer;

/// Wraps backing-store fetches in a distributed lock.
#[derive(Clone)]
pub struct StampedeGuard {
    locks: Arc<dyn LockCoordinator>,
    cache: CacheLayer,
    settings: LockSettings,
}

impl StampedeGuard {
    pub fn new(locks: Arc<dyn LockCoordinator>, cache: CacheLayer, settings: LockSettings) -> Self {
        Self {
            locks,
            cache,
            settings,
        }
    }

    /// Resolves a cache miss for `key`, fetching at most once per lock window.
    ///
    /// `fetch` is called at most once. Its result is cached before returning:
    /// `Some` with `base_ttl` (jittered), `None` as a confirmed-absent entry.
    ///
    /// # Errors
    ///
    /// Only errors returned by `fetch` are propagated. Lock coordinator
    /// failures degrade to an unguarded fetch.
    pub async fn fetch_with_guard<V, F, Fut>(
        &self,
        key: &CacheKey,
        base_ttl: Duration,
        fetch: F,
    ) -> Result<(Option<V>, GuardPath), StoreError>
    where
        V: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<V>, StoreError>>,
    {
        let lock_key = key.lock_key();
        let acquired = self
            .locks
            .try_acquire(
                &lock_key,
                self.settings.wait_timeout(),
                self.settings.lease_timeout(),
            )
            .await;

        let (value, path) = match acquired {
            Ok(Some(lease)) => {
                let outcome = self.fetch_locked(key, base_ttl, fetch).await;
                self.release(lease).await;
                outcome?
            },
            Ok(None) => self.after_timeout(key, base_ttl, fetch).await?,
            Err(e) => {
                warn!(
                    key = %key,
                    coordinator = self.locks.name(),
                    error = %e,
                    "Lock coordinator failed, fetching unguarded"
                );
                let value = self.fetch_and_populate(key, base_ttl, fetch).await?;
                (value, GuardPath::CoordinatorFallback)
            },
        };

        debug!(key = %key, path = %path, "Guarded fetch finished");
        self.cache.metrics().guard_path(path);

        Ok((value, path))
    }

    /// Fetches and populates without taking the lock.
    ///
    /// Used for keys that are not designated hot.
    pub async fn fetch_unguarded<V, F, Fut>(
        &self,
        key: &CacheKey,
        base_ttl: Duration,
        fetch: F,
    ) -> Result<Option<V>, StoreError>
    where
        V: Serialize,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<V>, StoreError>>,
    {
        self.fetch_and_populate(key, base_ttl, fetch).await
    }

    pub fn settings(&self) -> &LockSettings {
        &self.settings
    }

    async fn fetch_locked<V, F, Fut>(
        &self,
        key: &CacheKey,
        base_ttl: Duration,
        fetch: F,
    ) -> Result<(Option<V>, GuardPath), StoreError>
    where
        V: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<V>, StoreError>>,
    {
        // A previous holder may have populated the entry while we waited.
        if let Some(cached) = self.cache.recheck::<V>(key).await {
            return Ok((cached.into_option(), GuardPath::PopulatedByPeer));
        }

        let value = self.fetch_and_populate(key, base_ttl, fetch).await?;
        Ok((value, GuardPath::LockedFetch))
    }

    async fn after_timeout<V, F, Fut>(
        &self,
        key: &CacheKey,
        base_ttl: Duration,
        fetch: F,
    ) -> Result<(Option<V>, GuardPath), StoreError>
    where
        V: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<V>, StoreError>>,
    {
        tokio::time::sleep(self.settings.fallback_pause()).await;

        if let Some(cached) = self.cache.recheck::<V>(key).await {
            return Ok((cached.into_option(), GuardPath::TimeoutRecheckHit));
        }

        info!(
            key = %key,
            waited_ms = self.settings.wait_timeout_ms,
            "Lock wait timed out and entry still missing, fetching unguarded"
        );
        let value = self.fetch_and_populate(key, base_ttl, fetch).await?;
        Ok((value, GuardPath::TimeoutFallback))
    }

    async fn fetch_and_populate<V, F, Fut>(
        &self,
        key: &CacheKey,
        base_ttl: Duration,
        fetch: F,
    ) -> Result<Option<V>, StoreError>
    where
        V: Serialize,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<V>, StoreError>>,
    {
        let value = fetch().await?;

        match &value {
            Some(v) => self.cache.put(key, v, base_ttl).await,
            None => self.cache.put_absent(key).await,
        };

        Ok(value)
    }

    async fn release(&self, lease: Lease) {
        let lock_key = lease.key().to_string();
        if let Err(e) = self.locks.release(lease).await {
            warn!(key = %lock_key, error = %e, "Lock release failed, lease will expire on its own");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nestguard_backends::memory::{InMemoryLockCoordinator, MokaCacheBackend};
    use nestguard_core::{Cached, JitterPolicy, NoopMetrics};
    use std::sync::atomic::{AtomicU32, Ordering};

    const TTL: Duration = Duration::from_secs(600);

    fn guard_with(locks: Arc<InMemoryLockCoordinator>) -> StampedeGuard {
        let cache = CacheLayer::new(
            Arc::new(MokaCacheBackend::default()),
            JitterPolicy::default(),
            Duration::from_secs(60),
            Arc::new(NoopMetrics),
        );
        StampedeGuard::new(locks, cache, LockSettings::default())
    }

    #[tokio::test]
    async fn test_locked_fetch_populates_and_releases() {
        let locks = Arc::new(InMemoryLockCoordinator::new());
        let guard = guard_with(locks.clone());
        let key = CacheKey::new("housing-listings", "2");

        let (value, path) = guard
            .fetch_with_guard(&key, TTL, || async { Ok(Some("Studio".to_string())) })
            .await
            .unwrap();

        assert_eq!(value.as_deref(), Some("Studio"));
        assert_eq!(path, GuardPath::LockedFetch);
        assert!(!locks.is_locked(&key.lock_key()));
        assert_eq!(
            guard.cache.get::<String>(&key).await,
            Some(Cached::Present("Studio".to_string()))
        );
    }

    #[tokio::test]
    async fn test_peer_populated_entry_skips_fetch() {
        let guard = guard_with(Arc::new(InMemoryLockCoordinator::new()));
        let key = CacheKey::new("housing-listings", "2");
        guard.cache.put(&key, &"Studio".to_string(), TTL).await;

        let calls = AtomicU32::new(0);
        let counter = &calls;
        let (value, path) = guard
            .fetch_with_guard(&key, TTL, || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Some("Stale".to_string()))
            })
            .await
            .unwrap();

        assert_eq!(value.as_deref(), Some("Studio"));
        assert_eq!(path, GuardPath::PopulatedByPeer);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_store_error_still_releases_lock() {
        let locks = Arc::new(InMemoryLockCoordinator::new());
        let guard = guard_with(locks.clone());
        let key = CacheKey::new("housing-listings", "2");

        let err = guard
            .fetch_with_guard::<String, _, _>(&key, TTL, || async {
                Err(StoreError::unavailable("connection refused"))
            })
            .await
            .unwrap_err();

        assert!(err.is_transient());
        assert!(!locks.is_locked(&key.lock_key()));
        assert!(guard.cache.get::<String>(&key).await.is_none());
    }

    #[tokio::test]
    async fn test_absent_result_is_negatively_cached() {
        let guard = guard_with(Arc::new(InMemoryLockCoordinator::new()));
        let key = CacheKey::new("housing-listings", "9");

        let (value, _) = guard
            .fetch_with_guard::<String, _, _>(&key, TTL, || async { Ok(None) })
            .await
            .unwrap();

        assert!(value.is_none());
        assert_eq!(guard.cache.get::<String>(&key).await, Some(Cached::Absent));
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_written_during_pause_skips_fetch() {
        let locks = Arc::new(InMemoryLockCoordinator::new());
        let guard = guard_with(locks.clone());
        let key = CacheKey::new("housing-listings", "2");

        let _stuck = locks
            .try_acquire(&key.lock_key(), Duration::ZERO, Duration::from_secs(60))
            .await
            .unwrap()
            .unwrap();

        // Holder finishes after the 5s wait but inside the 500ms pause.
        let holder = {
            let cache = guard.cache.clone();
            let key = key.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(5_200)).await;
                cache.put(&key, &"Studio".to_string(), TTL).await;
            })
        };

        let calls = AtomicU32::new(0);
        let counter = &calls;
        let (value, path) = guard
            .fetch_with_guard(&key, TTL, || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Some("Stale".to_string()))
            })
            .await
            .unwrap();
        holder.await.unwrap();

        assert_eq!(value.as_deref(), Some("Studio"));
        assert_eq!(path, GuardPath::TimeoutRecheckHit);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_falls_back_to_direct_fetch() {
        let locks = Arc::new(InMemoryLockCoordinator::new());
        let guard = guard_with(locks.clone());
        let key = CacheKey::new("housing-listings", "2");

        // A holder that never finishes.
        let _stuck = locks
            .try_acquire(&key.lock_key(), Duration::ZERO, Duration::from_secs(60))
            .await
            .unwrap()
            .unwrap();

        let start = tokio::time::Instant::now();
        let (value, path) = guard
            .fetch_with_guard(&key, TTL, || async { Ok(Some(2u32)) })
            .await
            .unwrap();

        assert_eq!(value, Some(2));
        assert_eq!(path, GuardPath::TimeoutFallback);
        assert!(start.elapsed() >= Duration::from_millis(5_500));
    }
}
