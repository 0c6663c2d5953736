//! NestGuard Server - protected read-through cache and its HTTP surface.
//!
//! The lookup path consults, in order, the membership filter, the cache
//! layer, and the stampede guard before reaching the backing store:
//!
//! - [`cache::CacheLayer`]: jittered-TTL reads and writes, negative entries,
//!   pattern invalidation; backend failures degrade to misses.
//! - [`stampede::StampedeGuard`]: per-key lock around misses for hot keys,
//!   with timeout and coordinator-failure fallbacks.
//! - [`lookup::ProtectedCache`]: the orchestration of both behind the filter,
//!   plus the write notifications that keep them consistent.

pub mod cache;
pub mod error;
pub mod handlers;
pub mod lookup;
pub mod metrics;
pub mod server;
pub mod settings;
pub mod stampede;
pub mod state;

pub use error::{AppError, LookupError};
pub use lookup::{Backends, ProtectedCache};
pub use server::{create_app_router, create_router_with_state, run_server_with_state};
pub use settings::{ServerSettings, SettingsLoadError};
pub use state::AppState;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
