//! Nestguard Core - Domain types for the protected read-through cache
//!
//! This crate holds the synchronous building blocks shared by the backends and
//! the server:
//!
//! - [`MembershipFilter`]: lock-free Bloom filter guarding against lookups of
//!   keys that were never stored (cache penetration)
//! - [`JitterPolicy`]: randomized TTLs so entries written together do not
//!   expire together (cache avalanche)
//! - [`CacheKey`]: deterministic cache and lock key derivation
//! - [`Cached`]: envelope distinguishing cached values from confirmed absence
//! - [`GuardSettings`]: tunables for all of the above plus the lock timeouts
//!
//! ## Example
//!
//! ```
//! use nestguard_core::MembershipFilter;
//!
//! let filter = MembershipFilter::initialize(["1", "2", "3"], 0.01);
//! assert!(filter.might_contain("2"));
//!
//! filter.add("4");
//! assert!(filter.might_contain("4"));
//! ```

pub mod error;
pub mod filter;
pub mod key;
pub mod metrics;
pub mod settings;
pub mod ttl;
pub mod value;

pub use error::SettingsError;
pub use filter::{FilterParams, MembershipFilter};
pub use key::CacheKey;
pub use metrics::{GuardPath, MetricsSink, NoopMetrics};
pub use settings::{
    CacheSettings, FilterSettings, GuardSettings, HotKeyPolicy, LockSettings, MAX_TTL_SECONDS,
};
pub use ttl::JitterPolicy;
pub use value::Cached;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
