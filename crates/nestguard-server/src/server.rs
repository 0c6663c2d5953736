use std::net::SocketAddr;

use axum::{
    Router, middleware,
    routing::{delete, get, post, put},
};
use metrics_exporter_prometheus::PrometheusHandle;
use tower::ServiceBuilder;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::handlers::{
    admin::rebuild_filter,
    health::health_check,
    invalidate::{invalidate_entry, invalidate_namespace, invalidate_patterns},
    listing::{get_listing, listing_created, listing_deleted, listing_updated},
    metrics::metrics_handler,
};
use crate::metrics::http_metrics_middleware;
use crate::state::AppState;

/// Full router: application routes plus `/metrics`.
pub fn create_router_with_state(state: AppState, prometheus_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(prometheus_handle);

    with_middleware(app_routes(state).merge(metrics_router))
}

/// Application routes without `/metrics`, for tests that do not install a
/// recorder.
pub fn create_app_router(state: AppState) -> Router {
    with_middleware(app_routes(state))
}

fn app_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        // Lookup and write notifications
        .route(
            "/listings/{id}",
            get(get_listing).put(listing_updated).delete(listing_deleted),
        )
        .route("/listings/{id}/created", put(listing_created))
        // Cache invalidation
        .route("/cache/invalidate", post(invalidate_patterns))
        .route("/cache/{namespace}", delete(invalidate_namespace))
        .route("/cache/{namespace}/{id}", delete(invalidate_entry))
        .route("/admin/filter/rebuild", post(rebuild_filter))
        .with_state(state)
}

fn with_middleware(router: Router) -> Router {
    let request_ids = ServiceBuilder::new()
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id());

    router
        .layer(middleware::from_fn(http_metrics_middleware))
        .layer(request_ids)
}

/// Binds `addr` and serves until a shutdown signal arrives.
pub async fn run_server_with_state(
    addr: SocketAddr,
    state: AppState,
    prometheus_handle: PrometheusHandle,
) -> Result<(), std::io::Error> {
    let app = create_router_with_state(state, prometheus_handle);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr = %addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

/// Resolves on Ctrl+C or, on unix, SIGTERM.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    result = tokio::signal::ctrl_c() => log_ctrl_c(result),
                    _ = sigterm.recv() => tracing::info!("SIGTERM received, shutting down"),
                }
                return;
            },
            Err(e) => tracing::warn!(error = %e, "SIGTERM handler unavailable, Ctrl+C only"),
        }
    }

    log_ctrl_c(tokio::signal::ctrl_c().await);
}

fn log_ctrl_c(result: std::io::Result<()>) {
    match result {
        Ok(()) => tracing::info!("Ctrl+C received, shutting down"),
        Err(e) => tracing::error!(error = %e, "Ctrl+C handler failed, shutting down"),
    }
}
