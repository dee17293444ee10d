use std::collections::HashMap;
use std::time::Instant;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};
use tracing::{error, info, warn};

use super::fulfill::fulfill_order;
use super::support::{finish, propagated_request_id};
use crate::error::ApiError;
use crate::signing::constant_time_eq;
use crate::AppState;

const ROUTE: &str = "/v1/webhook";

/// Gateway push half of payment reconciliation. Once the shared secret
/// checks out, the event is always acknowledged with 200 — the gateway
/// retrying a malformed or already-processed event buys nothing.
pub(crate) async fn webhook_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
    body: Bytes,
) -> Response {
    let request_id = propagated_request_id(&headers, &state);
    let started = Instant::now();

    if let Some(expected) = &state.api.webhook_secret {
        let provided = params.get("secret").map(String::as_str).unwrap_or_default();
        if !constant_time_eq(expected.as_bytes(), provided.as_bytes()) {
            warn!("webhook rejected: bad secret");
            let response = ApiError::unauthorized(&request_id).into_response();
            return finish(&state, ROUTE, started, &request_id, response).await;
        }
    }

    process_event(&state, &body).await;
    let response = (StatusCode::OK, Json(json!({ "received": true }))).into_response();
    finish(&state, ROUTE, started, &request_id, response).await
}

async fn process_event(state: &AppState, body: &[u8]) {
    let payload: Value = match serde_json::from_slice(body) {
        Ok(value) => value,
        Err(err) => {
            warn!("webhook body is not valid json: {err}");
            return;
        }
    };
    let event = payload["event"].as_str().unwrap_or_default();
    info!(event, "webhook received");
    if event != "billing.paid" {
        return;
    }

    let Some(charge_id) = payload["data"]["id"].as_str() else {
        warn!("webhook event carries no charge id");
        return;
    };

    let order = match state.db.order_by_charge(charge_id) {
        Ok(Some(order)) => order,
        Ok(None) => {
            warn!(charge = charge_id, "no order for webhook charge");
            return;
        }
        Err(err) => {
            error!(charge = charge_id, "order lookup failed: {err}");
            return;
        }
    };

    if let Err(err) = fulfill_order(state, order.id).await {
        error!(order = %order.id, "webhook fulfillment failed: {err}");
    }
}
