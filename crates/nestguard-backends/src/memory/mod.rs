//! Process-local implementations of the backend traits.

mod cache;
mod lock;
mod store;

pub use cache::{MokaCacheBackend, MokaCacheConfig};
pub use lock::InMemoryLockCoordinator;
pub use store::InMemoryStore;
