//! Backing store, backend and metrics doubles.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use nestguard_backends::memory::InMemoryStore;
use nestguard_backends::{
    BackendError, BackingStore, CacheBackend, Lease, LockCoordinator, StoreError,
};
use nestguard_core::{GuardPath, MetricsSink};
use parking_lot::Mutex;

/// Store that counts fetches, optionally slows them down or fails them.
pub struct CountingStore<V> {
    inner: InMemoryStore<V>,
    fetches: AtomicUsize,
    latency: Duration,
    failing: AtomicBool,
}

impl<V> CountingStore<V> {
    pub fn new<K: Into<String>>(rows: impl IntoIterator<Item = (K, V)>) -> Self {
        Self {
            inner: rows.into_iter().collect(),
            fetches: AtomicUsize::new(0),
            latency: Duration::ZERO,
            failing: AtomicBool::new(false),
        }
    }

    /// Every fetch sleeps for `latency` before answering.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn insert(&self, id: &str, value: V) {
        self.inner.insert(id, value);
    }

    pub fn remove(&self, id: &str) {
        self.inner.remove(id);
    }
}

#[async_trait]
impl<V> BackingStore<V> for CountingStore<V>
where
    V: Clone + Send + Sync,
{
    async fn fetch_by_id(&self, id: &str) -> Result<Option<V>, StoreError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::unavailable("connection refused"));
        }
        self.inner.fetch_by_id(id).await
    }

    async fn list_all_keys(&self) -> Result<Vec<String>, StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::unavailable("connection refused"));
        }
        self.inner.list_all_keys().await
    }

    fn name(&self) -> &str {
        "counting"
    }
}

/// Cache backend whose every call fails.
pub struct FailingCacheBackend;

#[async_trait]
impl CacheBackend for FailingCacheBackend {
    async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, BackendError> {
        Err(BackendError::unavailable("failing", "down"))
    }

    async fn set(&self, _key: &str, _value: Vec<u8>, _ttl: Duration) -> Result<(), BackendError> {
        Err(BackendError::unavailable("failing", "down"))
    }

    async fn delete(&self, _key: &str) -> Result<bool, BackendError> {
        Err(BackendError::unavailable("failing", "down"))
    }

    async fn exists(&self, _key: &str) -> Result<bool, BackendError> {
        Err(BackendError::unavailable("failing", "down"))
    }

    async fn ttl(&self, _key: &str) -> Result<Option<Duration>, BackendError> {
        Err(BackendError::unavailable("failing", "down"))
    }

    async fn delete_matching(&self, _pattern: &str) -> Result<usize, BackendError> {
        Err(BackendError::unavailable("failing", "down"))
    }

    fn name(&self) -> &str {
        "failing"
    }
}

/// Lock coordinator that cannot be reached.
pub struct FailingLockCoordinator;

#[async_trait]
impl LockCoordinator for FailingLockCoordinator {
    async fn try_acquire(
        &self,
        _lock_key: &str,
        _wait: Duration,
        _lease: Duration,
    ) -> Result<Option<Lease>, BackendError> {
        Err(BackendError::unavailable("failing", "no quorum"))
    }

    async fn release(&self, lease: Lease) -> Result<(), BackendError> {
        Err(BackendError::LeaseLost {
            key: lease.key().to_string(),
        })
    }

    fn name(&self) -> &str {
        "failing"
    }
}

/// Metrics sink that remembers everything it was told.
#[derive(Default)]
pub struct RecordingMetrics {
    pub blocks: AtomicUsize,
    pub passes: AtomicUsize,
    pub hits: AtomicUsize,
    pub misses: AtomicUsize,
    pub errors: Mutex<Vec<&'static str>>,
    pub paths: Mutex<Vec<GuardPath>>,
}

impl RecordingMetrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn blocks(&self) -> usize {
        self.blocks.load(Ordering::SeqCst)
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    pub fn misses(&self) -> usize {
        self.misses.load(Ordering::SeqCst)
    }

    pub fn paths(&self) -> Vec<GuardPath> {
        self.paths.lock().clone()
    }

    pub fn errors(&self) -> Vec<&'static str> {
        self.errors.lock().clone()
    }
}

impl MetricsSink for RecordingMetrics {
    fn filter_block(&self) {
        self.blocks.fetch_add(1, Ordering::SeqCst);
    }

    fn filter_pass(&self) {
        self.passes.fetch_add(1, Ordering::SeqCst);
    }

    fn cache_hit(&self) {
        self.hits.fetch_add(1, Ordering::SeqCst);
    }

    fn cache_miss(&self) {
        self.misses.fetch_add(1, Ordering::SeqCst);
    }

    fn cache_error(&self, operation: &'static str) {
        self.errors.lock().push(operation);
    }

    fn guard_path(&self, path: GuardPath) {
        self.paths.lock().push(path);
    }
}
