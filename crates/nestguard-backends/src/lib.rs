//! # Nestguard Backends
//!
//! The external collaborators of the protected cache, consumed through narrow
//! async traits:
//!
//! - [`BackingStore`]: authoritative key → entity lookup
//! - [`CacheBackend`]: string-keyed byte store with per-entry TTL
//! - [`LockCoordinator`]: mutual exclusion with bounded wait and lease
//!
//! The [`memory`] module provides process-local implementations: a Moka-backed
//! cache, a lease-based lock coordinator and a map-backed store. They honor the
//! same contracts a networked deployment would (TTL expiry, lease expiry,
//! token-checked release).
//!
//! ## Example
//!
//! ```ignore
//! use std::time::Duration;
//! use nestguard_backends::{LockCoordinator, memory::InMemoryLockCoordinator};
//!
//! let locks = InMemoryLockCoordinator::new();
//! if let Some(lease) = locks
//!     .try_acquire("lock:housing-listings:1", Duration::from_secs(5), Duration::from_secs(10))
//!     .await?
//! {
//!     // critical section
//!     locks.release(lease).await?;
//! }
//! ```

pub mod error;
pub mod memory;
pub mod traits;

// Re-exports
pub use error::{BackendError, StoreError};
pub use traits::{BackingStore, CacheBackend, Lease, LockCoordinator};

// Re-export nestguard_core for consumers
pub use nestguard_core;
