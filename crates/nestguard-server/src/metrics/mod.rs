//! Metrics module for the guarded lookup path.

pub mod guard;
pub mod http;
pub mod setup;

pub use guard::{GuardMetrics, register_guard_metrics};
pub use http::{http_metrics_middleware, register_http_metrics};
pub use setup::init_metrics;
