use std::collections::HashMap;
use std::time::Instant;

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use retrato_model::ProductKind;
use serde_json::json;

use super::support::{finish, propagated_request_id};
use crate::error::ApiError;
use crate::AppState;

const ROUTE: &str = "/v1/account/orders";

/// Read-only view of a customer's own orders, gated by an HMAC account
/// token instead of a session. Eligible digital orders carry a fresh
/// short-lived download link.
pub(crate) async fn orders_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let request_id = propagated_request_id(&headers, &state);
    let started = Instant::now();
    let response = match run_orders(&state, &params, &request_id) {
        Ok(body) => (StatusCode::OK, Json(body)).into_response(),
        Err(err) => err.into_response(),
    };
    finish(&state, ROUTE, started, &request_id, response).await
}

fn run_orders(
    state: &AppState,
    params: &HashMap<String, String>,
    request_id: &str,
) -> Result<serde_json::Value, ApiError> {
    let email = params
        .get("email")
        .ok_or_else(|| ApiError::invalid("email, exp and sig are required", request_id))?;
    let exp: i64 = params
        .get("exp")
        .and_then(|raw| raw.parse().ok())
        .ok_or_else(|| ApiError::invalid("email, exp and sig are required", request_id))?;
    let sig = params
        .get("sig")
        .ok_or_else(|| ApiError::invalid("email, exp and sig are required", request_id))?;

    if !state
        .signer
        .verify_account(email, exp, sig, Utc::now().timestamp())
    {
        return Err(ApiError::unauthorized(request_id));
    }

    let customer = state
        .db
        .customer_by_email(email)
        .map_err(|e| ApiError::internal(e.to_string(), request_id))?
        .ok_or_else(|| ApiError::not_found("customer", request_id))?;
    let orders = state
        .db
        .orders_for_customer(customer.id)
        .map_err(|e| ApiError::internal(e.to_string(), request_id))?;

    let link_expiry = Utc::now().timestamp() + state.api.account_link_ttl.as_secs() as i64;
    let entries: Vec<serde_json::Value> = orders
        .into_iter()
        .map(|order| {
            let download_url = (order.product == ProductKind::Digital
                && order.status.is_paid_or_later())
            .then(|| {
                state
                    .signer
                    .download_url(&state.api.public_base_url, order.id, link_expiry)
            });
            json!({
                "order_id": order.id,
                "product": order.product,
                "size": order.size,
                "price_cents": order.price_cents,
                "status": order.status,
                "tracking_code": order.tracking_code,
                "created_at": order.created_at,
                "download_url": download_url,
            })
        })
        .collect();

    Ok(json!({ "orders": entries }))
}
