//! Request metrics.

use std::time::Instant;

use axum::extract::{MatchedPath, Request, State};
use axum::middleware::Next;
use axum::response::Response;

use super::AppState;

/// Record one `api.request` metric per routed request, tagged with the
/// matched route template rather than the raw path.
pub async fn track_requests(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let endpoint = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());
    let method = req.method().to_string();
    let started = Instant::now();

    let response = next.run(req).await;

    let duration_ms = started.elapsed().as_millis() as u64;
    state
        .telemetry
        .track_api_request(&endpoint, &method, response.status().as_u16(), duration_ms)
        .await;
    response
}
