//! Read-through cache layer over a [`CacheBackend`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use nestguard_backends::CacheBackend;
use nestguard_core::{CacheKey, Cached, JitterPolicy, MetricsSink};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

/// Typed get/put/invalidate over the cache backend.
///
/// Every TTL written goes through the [`JitterPolicy`]. Backend failures never
/// escape: reads degrade to a miss, writes and deletes are logged and counted.
///
/// # Examples
///
/// ```no_run
/// # use std::sync::Arc;
/// # use std::time::Duration;
/// # use nestguard_core::{CacheKey, JitterPolicy, NoopMetrics};
/// # use nestguard_backends::memory::MokaCacheBackend;
/// # use nestguard_server::cache::CacheLayer;
/// # #[tokio::main]
/// # async fn main() {
/// let layer = CacheLayer::new(
///     Arc::new(MokaCacheBackend::default()),
///     JitterPolicy::new(0.2),
///     Duration::from_secs(60),
///     Arc::new(NoopMetrics),
/// );
/// let key = CacheKey::new("housing-listings", "1");
///
/// layer.put(&key, &"Loft".to_string(), Duration::from_secs(600)).await;
/// if let Some(cached) = layer.get::<String>(&key).await {
///     println!("Cache hit: {:?}", cached);
/// }
/// # }
/// ```
#[derive(Clone)]
pub struct CacheLayer {
    backend: Arc<dyn CacheBackend>,
    jitter: JitterPolicy,
    negative_ttl: Duration,
    metrics: Arc<dyn MetricsSink>,
}

impl CacheLayer {
    pub fn new(
        backend: Arc<dyn CacheBackend>,
        jitter: JitterPolicy,
        negative_ttl: Duration,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        Self {
            backend,
            jitter,
            negative_ttl,
            metrics,
        }
    }

    /// Looks up `key`, recording a hit or a miss.
    ///
    /// `None` is a miss. `Some(Cached::Absent)` is a cached "confirmed absent".
    pub async fn get<V: DeserializeOwned>(&self, key: &CacheKey) -> Option<Cached<V>> {
        let result = self.read(key).await;

        if result.is_some() {
            debug!(key = %key, "Cache HIT");
            self.metrics.cache_hit();
        } else {
            debug!(key = %key, "Cache MISS");
            self.metrics.cache_miss();
        }

        result
    }

    /// Looks up `key` again without counting a hit or miss.
    ///
    /// Used for the double-checks after lock acquisition or a lock timeout,
    /// which would otherwise inflate the miss count of a single lookup.
    pub async fn recheck<V: DeserializeOwned>(&self, key: &CacheKey) -> Option<Cached<V>> {
        self.read(key).await
    }

    /// Stores `value` with TTL `base_ttl` ± jitter. Returns whether the write
    /// reached the backend.
    pub async fn put<V: Serialize>(&self, key: &CacheKey, value: &V, base_ttl: Duration) -> bool {
        self.write(key, &Cached::Present(value), base_ttl).await
    }

    /// Stores a confirmed-absent marker with the (jittered) negative TTL.
    pub async fn put_absent(&self, key: &CacheKey) -> bool {
        self.write(key, &Cached::<()>::Absent, self.negative_ttl).await
    }

    /// Removes `key` immediately. Returns whether an entry was removed.
    pub async fn invalidate(&self, key: &CacheKey) -> bool {
        let start = Instant::now();
        let result = self.backend.delete(&key.to_string()).await;
        self.metrics.cache_operation("invalidate", start.elapsed());

        match result {
            Ok(removed) => {
                debug!(key = %key, removed = removed, "Cache entry invalidated");
                removed
            },
            Err(e) => {
                warn!(key = %key, backend = self.backend.name(), error = %e, "Cache invalidate failed");
                self.metrics.cache_error("invalidate");
                false
            },
        }
    }

    /// Remaining TTL of `key`, `None` on a miss or a backend error.
    pub async fn remaining_ttl(&self, key: &CacheKey) -> Option<Duration> {
        match self.backend.ttl(&key.to_string()).await {
            Ok(ttl) => ttl,
            Err(e) => {
                warn!(key = %key, error = %e, "Cache TTL lookup failed");
                self.metrics.cache_error("ttl");
                None
            },
        }
    }

    /// The jitter policy applied to writes.
    pub fn jitter(&self) -> JitterPolicy {
        self.jitter
    }

    pub(crate) fn backend(&self) -> &dyn CacheBackend {
        self.backend.as_ref()
    }

    pub(crate) fn metrics(&self) -> &dyn MetricsSink {
        self.metrics.as_ref()
    }

    async fn read<V: DeserializeOwned>(&self, key: &CacheKey) -> Option<Cached<V>> {
        let start = Instant::now();
        let result = self.backend.get(&key.to_string()).await;
        self.metrics.cache_operation("get", start.elapsed());

        match result {
            Ok(Some(bytes)) => match serde_json::from_slice(&bytes) {
                Ok(cached) => Some(cached),
                Err(e) => {
                    warn!(key = %key, error = %e, "Undecodable cache entry, treating as miss");
                    self.metrics.cache_error("decode");
                    None
                },
            },
            Ok(None) => None,
            Err(e) => {
                warn!(
                    key = %key,
                    backend = self.backend.name(),
                    error = %e,
                    "Cache read failed, treating as miss"
                );
                self.metrics.cache_error("get");
                None
            },
        }
    }

    async fn write<V: Serialize>(&self, key: &CacheKey, cached: &Cached<V>, base_ttl: Duration) -> bool {
        let bytes = match serde_json::to_vec(cached) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(key = %key, error = %e, "Value not serializable, skipping cache write");
                self.metrics.cache_error("encode");
                return false;
            },
        };

        let ttl = self.jitter.apply(base_ttl);
        let start = Instant::now();
        let result = self.backend.set(&key.to_string(), bytes, ttl).await;
        self.metrics.cache_operation("put", start.elapsed());

        match result {
            Ok(()) => {
                debug!(key = %key, ttl_ms = ttl.as_millis() as u64, absent = cached.is_absent(), "Cached");
                true
            },
            Err(e) => {
                warn!(key = %key, backend = self.backend.name(), error = %e, "Cache write failed");
                self.metrics.cache_error("put");
                false
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nestguard_backends::memory::MokaCacheBackend;
    use nestguard_core::NoopMetrics;

    const BASE_TTL: Duration = Duration::from_secs(600);

    fn layer() -> CacheLayer {
        CacheLayer::new(
            Arc::new(MokaCacheBackend::default()),
            JitterPolicy::new(0.2),
            Duration::from_secs(60),
            Arc::new(NoopMetrics),
        )
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let layer = layer();
        let key = CacheKey::new("housing-listings", "1");

        assert!(layer.put(&key, &"Loft".to_string(), BASE_TTL).await);
        assert_eq!(
            layer.get::<String>(&key).await,
            Some(Cached::Present("Loft".to_string()))
        );
    }

    #[tokio::test]
    async fn test_invalidate_then_miss() {
        let layer = layer();
        let key = CacheKey::new("housing-listings", "4");

        layer.put(&key, &4u32, BASE_TTL).await;
        assert!(layer.invalidate(&key).await);
        assert!(layer.get::<u32>(&key).await.is_none());
    }

    #[tokio::test]
    async fn test_absent_marker_round_trip() {
        let layer = layer();
        let key = CacheKey::new("housing-listings", "404");

        layer.put_absent(&key).await;
        let cached = layer.get::<String>(&key).await;
        assert_eq!(cached, Some(Cached::Absent));

        // confirmed-absent entries live for the short negative TTL
        let ttl = layer.remaining_ttl(&key).await.unwrap();
        assert!(ttl <= Duration::from_secs(72));
    }

    #[tokio::test]
    async fn test_undecodable_entry_is_miss() {
        let backend = Arc::new(MokaCacheBackend::default());
        let layer = CacheLayer::new(
            backend.clone(),
            JitterPolicy::none(),
            Duration::from_secs(60),
            Arc::new(NoopMetrics),
        );
        let key = CacheKey::new("housing-listings", "1");
        backend
            .set(&key.to_string(), b"not json".to_vec(), BASE_TTL)
            .await
            .unwrap();

        assert!(layer.get::<String>(&key).await.is_none());
    }

    #[tokio::test]
    async fn test_writes_in_one_burst_get_spread_ttls() {
        let layer = layer();
        let mut ttls = Vec::new();

        for i in 0..200 {
            let key = CacheKey::new("housing-listings", i.to_string());
            layer.put(&key, &i, BASE_TTL).await;
            ttls.push(layer.remaining_ttl(&key).await.unwrap());
        }

        let min = *ttls.iter().min().unwrap();
        let max = *ttls.iter().max().unwrap();

        assert!(min >= Duration::from_secs(479));
        assert!(max <= Duration::from_secs(720));
        // 200 draws over a 240s window
        assert!(max - min > Duration::from_secs(120), "spread {:?}", max - min);
    }
}
