use axum::{
    extract::State,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};

use super::AppState;

/// Liveness probe. Answers `ok` while the database is reachable.
pub async fn health(State(state): State<AppState>) -> Response {
    let no_store = [(header::CACHE_CONTROL, HeaderValue::from_static("no-store"))];
    match state.repository.ping().await {
        Ok(()) => (StatusCode::OK, no_store, "ok").into_response(),
        Err(err) => {
            tracing::error!("Health check failed: {}", err);
            (StatusCode::SERVICE_UNAVAILABLE, no_store, "database unavailable").into_response()
        }
    }
}
