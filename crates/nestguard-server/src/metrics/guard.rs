//! Lookup-path metrics recording.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use metrics::{counter, histogram};
use nestguard_core::{GuardPath, MetricsSink};

/// Registra las metricas del lookup protegido.
/// Llamar una vez al inicio para registrar las metricas.
pub fn register_guard_metrics() {
    metrics::describe_counter!(
        "nestguard_filter_blocks_total",
        "Lookups rejected by the membership filter"
    );
    metrics::describe_counter!(
        "nestguard_filter_passes_total",
        "Lookups let through by the membership filter"
    );
    metrics::describe_counter!("nestguard_cache_hits_total", "Total number of cache hits");
    metrics::describe_counter!("nestguard_cache_misses_total", "Total number of cache misses");
    metrics::describe_counter!(
        "nestguard_cache_errors_total",
        "Cache backend failures treated as misses"
    );
    metrics::describe_counter!(
        "nestguard_guard_paths_total",
        "Guarded fetches by exit path"
    );
    metrics::describe_histogram!(
        "nestguard_cache_operation_seconds",
        "Time spent on cache backend operations"
    );
}

/// [`MetricsSink`] on top of the `metrics` facade.
///
/// Keeps local atomic counters alongside for hit-rate reporting on the health
/// endpoint. Clones share the counters.
#[derive(Debug, Clone, Default)]
pub struct GuardMetrics {
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
    blocks: Arc<AtomicU64>,
    passes: Arc<AtomicU64>,
}

impl GuardMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Calcula hit rate (para logging/debugging)
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits() as f64;
        let total = hits + self.misses() as f64;
        if total == 0.0 { 0.0 } else { hits / total }
    }

    /// Share of lookups answered by the filter alone.
    pub fn block_rate(&self) -> f64 {
        let blocks = self.blocks() as f64;
        let total = blocks + self.passes() as f64;
        if total == 0.0 { 0.0 } else { blocks / total }
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn blocks(&self) -> u64 {
        self.blocks.load(Ordering::Relaxed)
    }

    pub fn passes(&self) -> u64 {
        self.passes.load(Ordering::Relaxed)
    }
}

impl MetricsSink for GuardMetrics {
    fn filter_block(&self) {
        self.blocks.fetch_add(1, Ordering::Relaxed);
        counter!("nestguard_filter_blocks_total").increment(1);
    }

    fn filter_pass(&self) {
        self.passes.fetch_add(1, Ordering::Relaxed);
        counter!("nestguard_filter_passes_total").increment(1);
    }

    fn cache_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
        counter!("nestguard_cache_hits_total").increment(1);
    }

    fn cache_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
        counter!("nestguard_cache_misses_total").increment(1);
    }

    fn cache_error(&self, operation: &'static str) {
        counter!("nestguard_cache_errors_total", "operation" => operation).increment(1);
    }

    fn guard_path(&self, path: GuardPath) {
        counter!("nestguard_guard_paths_total", "path" => path.as_str()).increment(1);
    }

    fn cache_operation(&self, operation: &'static str, elapsed: Duration) {
        histogram!("nestguard_cache_operation_seconds", "operation" => operation)
            .record(elapsed.as_secs_f64());
    }
}
