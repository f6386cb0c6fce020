use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::server::ProxyState;

/// Key probed by the readiness check; never written.
const READINESS_PROBE_KEY: &str = "ccproxy:readyz";

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[derive(Serialize)]
struct ReadyResponse {
    status: &'static str,
    cache: &'static str,
    cache_available: bool,
}

pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, Json(HealthResponse { status: "ok" }))
}

/// Reports ready whenever the process serves requests. The cache is
/// fail-open, so an unreachable cache only shows up in `cache_available`.
pub async fn readyz(State(state): State<ProxyState>) -> impl IntoResponse {
    let cache_available = match state.cache.load(READINESS_PROBE_KEY).await {
        Ok(_) => true,
        Err(e) => {
            tracing::warn!(error = %e, "readiness probe: cache unavailable");
            false
        }
    };
    (
        StatusCode::OK,
        Json(ReadyResponse {
            status: "ready",
            cache: state.cache.backend(),
            cache_available,
        }),
    )
}

pub async fn not_found() -> Response {
    (StatusCode::NOT_FOUND, "Not Found").into_response()
}
