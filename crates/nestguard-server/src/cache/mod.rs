//! Cache module for the protected lookup path.
//!
//! A typed layer over a [`CacheBackend`](nestguard_backends::CacheBackend)
//! with jittered TTLs, negative entries, and pattern-based invalidation.

pub mod invalidation;
pub mod layer;

// Re-exports
pub use invalidation::InvalidationResult;
pub use layer::CacheLayer;
pub use nestguard_core::CacheKey;
