//! Per-route HTTP request metrics.

use std::time::Instant;

use axum::{body::Body, extract::MatchedPath, http::Request, middleware::Next, response::Response};
use metrics::{counter, histogram};

const REQUESTS_TOTAL: &str = "nestguard_http_requests_total";
const REQUEST_SECONDS: &str = "nestguard_http_request_duration_seconds";

/// Counts requests and records their latency.
///
/// Labels use the route template (`/listings/{id}`), never the raw URI, so
/// probing random ids cannot blow up label cardinality.
pub async fn http_metrics_middleware(
    route: Option<MatchedPath>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let method = request.method().as_str().to_owned();
    let route = route.map_or_else(|| "unmatched".to_owned(), |p| p.as_str().to_owned());
    let started = Instant::now();

    let response = next.run(request).await;

    let elapsed = started.elapsed().as_secs_f64();
    let class = status_class(response.status().as_u16());

    histogram!(REQUEST_SECONDS, "method" => method.clone(), "route" => route.clone())
        .record(elapsed);
    counter!(REQUESTS_TOTAL, "method" => method, "route" => route, "status" => class)
        .increment(1);

    response
}

fn status_class(status: u16) -> &'static str {
    match status {
        100..=199 => "1xx",
        200..=299 => "2xx",
        300..=399 => "3xx",
        400..=499 => "4xx",
        _ => "5xx",
    }
}

pub fn register_http_metrics() {
    metrics::describe_counter!(REQUESTS_TOTAL, "HTTP requests by route and status class");
    metrics::describe_histogram!(REQUEST_SECONDS, "HTTP request latency in seconds");
}
