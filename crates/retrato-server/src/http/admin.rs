use std::collections::HashMap;
use std::time::Instant;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use retrato_core::OrderId;
use retrato_model::{product_spec, OrderStatus};
use retrato_store::AdminOrderUpdate;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use super::support::{finish, propagated_request_id};
use crate::clients::email;
use crate::error::ApiError;
use crate::signing::constant_time_eq;
use crate::AppState;

const LIST_ROUTE: &str = "/v1/admin/orders";

fn authorize(state: &AppState, headers: &HeaderMap, request_id: &str) -> Result<(), ApiError> {
    let provided = headers
        .get("x-admin-key")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if constant_time_eq(state.api.admin_key.as_bytes(), provided.as_bytes()) {
        Ok(())
    } else {
        Err(ApiError::unauthorized(request_id))
    }
}

pub(crate) async fn list_orders_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let request_id = propagated_request_id(&headers, &state);
    let started = Instant::now();
    let response = match run_list(&state, &headers, &params, &request_id) {
        Ok(body) => (StatusCode::OK, Json(body)).into_response(),
        Err(err) => err.into_response(),
    };
    finish(&state, LIST_ROUTE, started, &request_id, response).await
}

fn run_list(
    state: &AppState,
    headers: &HeaderMap,
    params: &HashMap<String, String>,
    request_id: &str,
) -> Result<serde_json::Value, ApiError> {
    authorize(state, headers, request_id)?;

    let filter = match params.get("status").map(String::as_str) {
        None | Some("all") | Some("") => None,
        Some(raw) => Some(
            OrderStatus::parse(raw).map_err(|e| ApiError::invalid(e.to_string(), request_id))?,
        ),
    };
    let page: u32 = params
        .get("page")
        .map(|raw| raw.parse())
        .transpose()
        .map_err(|_| ApiError::invalid("page must be a positive integer", request_id))?
        .unwrap_or(1)
        .max(1);

    let page_size = state.api.admin_page_size;
    let listing = state
        .db
        .list_orders(filter, page, page_size)
        .map_err(|e| ApiError::internal(e.to_string(), request_id))?;
    let total_pages = listing.total.div_ceil(u64::from(page_size));

    Ok(json!({
        "orders": listing.orders,
        "total": listing.total,
        "page": page,
        "total_pages": total_pages,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct UpdateRequest {
    order_id: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    tracking_code: Option<String>,
    #[serde(default)]
    notes: Option<String>,
}

pub(crate) async fn update_order_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request_id = propagated_request_id(&headers, &state);
    let started = Instant::now();
    let response = match run_update(&state, &headers, &body, &request_id).await {
        Ok(body) => (StatusCode::OK, Json(body)).into_response(),
        Err(err) => err.into_response(),
    };
    finish(&state, LIST_ROUTE, started, &request_id, response).await
}

async fn run_update(
    state: &AppState,
    headers: &HeaderMap,
    body: &[u8],
    request_id: &str,
) -> Result<serde_json::Value, ApiError> {
    authorize(state, headers, request_id)?;

    let payload: UpdateRequest = serde_json::from_slice(body)
        .map_err(|e| ApiError::invalid(format!("malformed update payload: {e}"), request_id))?;
    let order_id = OrderId::parse(&payload.order_id)
        .map_err(|e| ApiError::invalid(e.to_string(), request_id))?;
    let status = payload
        .status
        .as_deref()
        .map(OrderStatus::parse)
        .transpose()
        .map_err(|e| ApiError::invalid(e.to_string(), request_id))?;

    let update = AdminOrderUpdate {
        status,
        tracking_code: payload.tracking_code.clone(),
        notes: payload.notes,
    };
    state
        .db
        .update_order_admin(order_id, &update, Utc::now())
        .map_err(ApiError::from)
        .map_err(|mut err| {
            err.request_id = request_id.to_string();
            err
        })?;
    info!(order = %order_id, "admin order update applied");

    // Tracking code entry on a shipped order triggers the shipping email;
    // a mail failure never fails the update.
    if let (Some(tracking_code), Some(OrderStatus::Shipped)) = (&payload.tracking_code, status) {
        match shipping_context(state, order_id) {
            Ok(Some((to, name, product_name))) => {
                let message = email::shipping_email(&to, &name, tracking_code, product_name);
                if let Err(err) = state.mailer.send(&message).await {
                    warn!(order = %order_id, "failed to send shipping email: {err}");
                } else {
                    info!(order = %order_id, to = %to, "shipping email sent");
                }
            }
            Ok(None) => warn!(order = %order_id, "shipping email skipped: order context missing"),
            Err(err) => warn!(order = %order_id, "shipping email skipped: {err}"),
        }
    }

    Ok(json!({ "success": true }))
}

fn shipping_context(
    state: &AppState,
    order_id: OrderId,
) -> Result<Option<(String, String, &'static str)>, retrato_store::StoreError> {
    let Some(order) = state.db.order(order_id)? else {
        return Ok(None);
    };
    let Some(customer) = state.db.customer(order.customer_id)? else {
        return Ok(None);
    };
    Ok(Some((
        customer.email,
        customer.name,
        product_spec(order.product).name,
    )))
}
