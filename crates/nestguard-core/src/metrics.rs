//! Metrics sink called by the guarded lookup path.
//!
//! Implementations must not fail or block: emission problems are theirs to
//! swallow, lookups never observe them.

use std::fmt;
use std::time::Duration;

/// Exit taken by a guarded fetch after a cache miss.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GuardPath {
    /// Lock acquired, cache still empty, backing store fetched.
    LockedFetch,
    /// Lock acquired, but another holder had already populated the cache.
    PopulatedByPeer,
    /// Lock wait timed out, the re-check found the entry.
    TimeoutRecheckHit,
    /// Lock wait timed out and the entry was still missing; fetched unguarded.
    TimeoutFallback,
    /// The lock coordinator failed; fetched unguarded.
    CoordinatorFallback,
}

impl GuardPath {
    /// Label value used in metrics and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            GuardPath::LockedFetch => "locked_fetch",
            GuardPath::PopulatedByPeer => "populated_by_peer",
            GuardPath::TimeoutRecheckHit => "timeout_recheck_hit",
            GuardPath::TimeoutFallback => "timeout_fallback",
            GuardPath::CoordinatorFallback => "coordinator_fallback",
        }
    }

    /// True if the backing store was called without holding the lock.
    pub fn is_unguarded_fetch(&self) -> bool {
        matches!(
            self,
            GuardPath::TimeoutFallback | GuardPath::CoordinatorFallback
        )
    }
}

impl fmt::Display for GuardPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Counter-increment interface for lookup observability.
pub trait MetricsSink: Send + Sync {
    /// The membership filter rejected a key.
    fn filter_block(&self);

    /// The membership filter let a key through.
    fn filter_pass(&self);

    /// Cache returned an entry.
    fn cache_hit(&self);

    /// Cache had no entry.
    fn cache_miss(&self);

    /// A cache backend call failed and was treated as a miss.
    fn cache_error(&self, _operation: &'static str) {}

    /// A guarded fetch finished through `path`.
    fn guard_path(&self, _path: GuardPath) {}

    /// Latency of one cache backend operation.
    fn cache_operation(&self, _operation: &'static str, _elapsed: Duration) {}
}

/// Sink that drops everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {
    fn filter_block(&self) {}
    fn filter_pass(&self) {}
    fn cache_hit(&self) {}
    fn cache_miss(&self) {}
}
