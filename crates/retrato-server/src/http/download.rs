use std::collections::HashMap;
use std::time::Instant;

use axum::extract::{Query, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use retrato_core::OrderId;
use retrato_store::Bucket;
use tracing::info;

use super::support::{finish, propagated_request_id};
use crate::error::{ApiError, ApiErrorCode};
use crate::AppState;

const ROUTE: &str = "/v1/download";

/// Signed-URL delivery of the clean (non-watermarked) portrait. The token
/// is minted by fulfillment or by the account view; there is no session.
pub(crate) async fn download_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let request_id = propagated_request_id(&headers, &state);
    let started = Instant::now();
    let response = match run_download(&state, &params, &request_id) {
        Ok((order_id, bytes)) => {
            let mut response = (StatusCode::OK, bytes).into_response();
            response
                .headers_mut()
                .insert("content-type", HeaderValue::from_static("image/jpeg"));
            if let Ok(value) = HeaderValue::from_str(&format!(
                "attachment; filename=\"retrato-{order_id}.jpg\""
            )) {
                response.headers_mut().insert("content-disposition", value);
            }
            response
        }
        Err(err) => err.into_response(),
    };
    finish(&state, ROUTE, started, &request_id, response).await
}

fn run_download(
    state: &AppState,
    params: &HashMap<String, String>,
    request_id: &str,
) -> Result<(OrderId, Vec<u8>), ApiError> {
    let order_param = params
        .get("order")
        .ok_or_else(|| ApiError::invalid("order, exp and sig are required", request_id))?;
    let exp: i64 = params
        .get("exp")
        .and_then(|raw| raw.parse().ok())
        .ok_or_else(|| ApiError::invalid("order, exp and sig are required", request_id))?;
    let sig = params
        .get("sig")
        .ok_or_else(|| ApiError::invalid("order, exp and sig are required", request_id))?;
    let order_id = OrderId::parse(order_param)
        .map_err(|e| ApiError::invalid(e.to_string(), request_id))?;

    if !state
        .signer
        .verify_download(order_id, exp, sig, Utc::now().timestamp())
    {
        return Err(ApiError::unauthorized(request_id));
    }

    let order = state
        .db
        .order(order_id)
        .map_err(|e| ApiError::internal(e.to_string(), request_id))?
        .ok_or_else(|| ApiError::not_found("order", request_id))?;
    if !order.status.is_paid_or_later() {
        return Err(ApiError::new(
            ApiErrorCode::PaymentRequired,
            "payment required",
            request_id,
        ));
    }

    let generation = state
        .db
        .generation(order.generation_id)
        .map_err(|e| ApiError::internal(e.to_string(), request_id))?
        .ok_or_else(|| ApiError::not_found("image", request_id))?;
    let clean_key = generation
        .generated_path
        .ok_or_else(|| ApiError::not_found("image", request_id))?;

    let bytes = state
        .media
        .get(Bucket::Generated, &clean_key)
        .map_err(|e| ApiError::internal(format!("image read failed: {e}"), request_id))?;
    info!(order = %order_id, "download served");
    Ok((order_id, bytes))
}
