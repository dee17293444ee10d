use std::time::Instant;

use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use super::support::{finish, propagated_request_id};
use crate::{AppState, CRATE_NAME};

pub(crate) async fn healthz_handler(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let request_id = propagated_request_id(&headers, &state);
    let started = Instant::now();
    let response = (StatusCode::OK, "ok").into_response();
    finish(&state, "/healthz", started, &request_id, response).await
}

pub(crate) async fn readyz_handler(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let request_id = propagated_request_id(&headers, &state);
    let started = Instant::now();
    let response = if !state.ready.load(std::sync::atomic::Ordering::Relaxed) {
        (StatusCode::SERVICE_UNAVAILABLE, "starting").into_response()
    } else {
        match state.db.ping() {
            Ok(()) => (StatusCode::OK, "ready").into_response(),
            Err(err) => {
                tracing::warn!("readiness probe failed: {err}");
                (StatusCode::SERVICE_UNAVAILABLE, "store unavailable").into_response()
            }
        }
    };
    finish(&state, "/readyz", started, &request_id, response).await
}

pub(crate) async fn metrics_handler(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let request_id = propagated_request_id(&headers, &state);
    let started = Instant::now();
    let body = state.metrics.render().await;
    let response = (StatusCode::OK, body).into_response();
    finish(&state, "/metrics", started, &request_id, response).await
}

pub(crate) async fn version_handler(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let request_id = propagated_request_id(&headers, &state);
    let started = Instant::now();
    let payload = json!({
        "crate": CRATE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "config_schema_version": crate::config::CONFIG_SCHEMA_VERSION,
    });
    let mut response = Json(payload).into_response();
    if let Ok(value) = HeaderValue::from_str("public, max-age=30") {
        response.headers_mut().insert("cache-control", value);
    }
    finish(&state, "/v1/version", started, &request_id, response).await
}
