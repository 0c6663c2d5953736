//! Metrics setup and initialization.

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::info;

use super::{register_guard_metrics, register_http_metrics};

/// Histogram buckets in seconds, from an in-process cache hit (~100µs) up to
/// a request that sat out a full lock wait.
const LATENCY_BUCKETS: &[f64] = &[
    0.0001, 0.00025, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5,
    5.0, 10.0,
];

/// Installs the Prometheus recorder and returns the handle for `/metrics`.
///
/// # Errors
///
/// Fails if a global recorder is already installed.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new()
        .set_buckets(LATENCY_BUCKETS)?
        .install_recorder()?;

    register_guard_metrics();
    register_http_metrics();

    info!(buckets = LATENCY_BUCKETS.len(), "Metrics recorder installed");
    Ok(handle)
}
