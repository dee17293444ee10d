use std::collections::HashMap;
use std::time::Instant;

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use retrato_core::OrderId;
use retrato_model::PixStatus;
use serde_json::json;
use tracing::info;

use super::fulfill::fulfill_order;
use super::support::{finish, propagated_request_id};
use crate::error::ApiError;
use crate::AppState;

const ROUTE: &str = "/v1/checkout/status";

/// Client-side polling half of payment reconciliation. The gateway's status
/// field is the source of truth; a `PAID` report triggers fulfillment
/// before the status is echoed back.
pub(crate) async fn status_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let request_id = propagated_request_id(&headers, &state);
    let started = Instant::now();
    let response = match run_status(&state, &params, &request_id).await {
        Ok(body) => (StatusCode::OK, Json(body)).into_response(),
        Err(err) => err.into_response(),
    };
    finish(&state, ROUTE, started, &request_id, response).await
}

async fn run_status(
    state: &AppState,
    params: &HashMap<String, String>,
    request_id: &str,
) -> Result<serde_json::Value, ApiError> {
    let pix_id = params
        .get("pix_id")
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::invalid("pix_id and order_id are required", request_id))?;
    let order_id = params
        .get("order_id")
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::invalid("pix_id and order_id are required", request_id))?;
    let order_id = OrderId::parse(order_id)
        .map_err(|e| ApiError::invalid(e.to_string(), request_id))?;

    // Development hook: short-circuits the gateway entirely. Refused unless
    // explicitly enabled in config.
    if params.get("simulate").map(String::as_str) == Some("true") {
        if !state.api.allow_simulated_payments {
            return Err(ApiError::invalid(
                "simulated payments are disabled",
                request_id,
            ));
        }
        info!(order = %order_id, "simulated payment accepted");
        fulfill_order(state, order_id)
            .await
            .map_err(|e| ApiError::internal(e.to_string(), request_id))?;
        return Ok(json!({ "status": PixStatus::Paid, "expires_at": null }));
    }

    let charge = state
        .gateway
        .charge_status(pix_id)
        .await
        .map_err(|e| ApiError::upstream(e.to_string(), request_id))?;

    if charge.status == PixStatus::Paid {
        fulfill_order(state, order_id)
            .await
            .map_err(|e| ApiError::internal(e.to_string(), request_id))?;
    }

    Ok(json!({
        "status": charge.status,
        "expires_at": charge.expires_at,
    }))
}
