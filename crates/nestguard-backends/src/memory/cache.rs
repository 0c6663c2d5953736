//! TTL cache backend using Moka.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use glob::Pattern;
use moka::Expiry;
use moka::future::Cache;
use tracing::debug;

use crate::error::BackendError;
use crate::traits::CacheBackend;

/// Configuracion del backend Moka.
#[derive(Debug, Clone)]
pub struct MokaCacheConfig {
    /// Maximo numero de entries (default: 100000)
    pub max_capacity: u64,
}

impl Default for MokaCacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: 100_000,
        }
    }
}

#[derive(Clone)]
struct Entry {
    bytes: Arc<[u8]>,
    ttl: Duration,
    written_at: Instant,
}

impl Entry {
    fn remaining(&self) -> Duration {
        self.ttl.saturating_sub(self.written_at.elapsed())
    }
}

/// Each entry expires after the TTL it was written with.
struct PerEntryTtl;

impl Expiry<String, Entry> for PerEntryTtl {
    fn expire_after_create(&self, _key: &String, value: &Entry, _created_at: Instant) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &Entry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// In-process cache backend with per-entry TTL.
///
/// Thread-safe and cheap to clone; clones share the same storage.
#[derive(Clone)]
pub struct MokaCacheBackend {
    inner: Cache<String, Entry>,
}

impl MokaCacheBackend {
    /// Crea un nuevo backend con la configuracion dada.
    pub fn new(config: MokaCacheConfig) -> Self {
        let inner = Cache::builder()
            .max_capacity(config.max_capacity)
            .expire_after(PerEntryTtl)
            .build();

        Self { inner }
    }

    /// Retorna el numero aproximado de entries en cache.
    pub fn entry_count(&self) -> u64 {
        self.inner.entry_count()
    }

    /// Fuerza la limpieza de entries expiradas (para tests principalmente).
    pub async fn sync(&self) {
        self.inner.run_pending_tasks().await;
    }
}

impl Default for MokaCacheBackend {
    fn default() -> Self {
        Self::new(MokaCacheConfig::default())
    }
}

#[async_trait]
impl CacheBackend for MokaCacheBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BackendError> {
        Ok(self.inner.get(key).await.map(|entry| entry.bytes.to_vec()))
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), BackendError> {
        let entry = Entry {
            bytes: value.into(),
            ttl,
            written_at: Instant::now(),
        };
        self.inner.insert(key.to_string(), entry).await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, BackendError> {
        Ok(self.inner.remove(key).await.is_some())
    }

    async fn exists(&self, key: &str) -> Result<bool, BackendError> {
        Ok(self.inner.get(key).await.is_some())
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, BackendError> {
        Ok(self.inner.get(key).await.map(|entry| entry.remaining()))
    }

    async fn delete_matching(&self, pattern: &str) -> Result<usize, BackendError> {
        let compiled = Pattern::new(pattern).map_err(|e| BackendError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;

        // Snapshot first; entries may change during iteration.
        let matching: Vec<Arc<String>> = self
            .inner
            .iter()
            .filter(|(key, _)| compiled.matches(key))
            .map(|(key, _)| key)
            .collect();

        let mut removed = 0;
        for key in matching {
            if self.inner.remove(key.as_str()).await.is_some() {
                removed += 1;
            }
        }

        debug!(pattern = %pattern, removed = removed, "Deleted matching cache entries");
        Ok(removed)
    }

    fn name(&self) -> &str {
        "moka"
    }
}
