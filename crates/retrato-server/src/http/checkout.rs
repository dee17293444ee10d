use std::time::Instant;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use retrato_core::{GenerationId, OrderId};
use retrato_model::{
    product_spec, CustomerDraft, GenerationStatus, Order, OrderStatus, ProductKind,
    ShippingAddress,
};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use super::support::{finish, propagated_request_id};
use crate::clients::{ChargeCustomer, CreateChargeRequest};
use crate::error::ApiError;
use crate::AppState;

const ROUTE: &str = "/v1/checkout";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CheckoutRequest {
    product: String,
    generation_id: String,
    #[serde(default)]
    size: Option<String>,
    customer: CustomerDraft,
    #[serde(default)]
    shipping_address: Option<ShippingAddress>,
}

pub(crate) async fn checkout_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request_id = propagated_request_id(&headers, &state);
    let started = Instant::now();
    let response = match run_checkout(&state, &body, &request_id).await {
        Ok(body) => (StatusCode::OK, Json(body)).into_response(),
        Err(err) => err.into_response(),
    };
    finish(&state, ROUTE, started, &request_id, response).await
}

async fn run_checkout(
    state: &AppState,
    body: &[u8],
    request_id: &str,
) -> Result<serde_json::Value, ApiError> {
    let payload: CheckoutRequest = serde_json::from_slice(body)
        .map_err(|e| ApiError::invalid(format!("malformed checkout payload: {e}"), request_id))?;

    let product = ProductKind::parse(&payload.product)
        .map_err(|e| ApiError::invalid(e.to_string(), request_id))?;
    let generation_id = GenerationId::parse(&payload.generation_id)
        .map_err(|e| ApiError::invalid(e.to_string(), request_id))?;
    payload
        .customer
        .validate()
        .map_err(|e| ApiError::invalid(e.to_string(), request_id))?;

    let spec = product_spec(product);
    spec.validate_size(payload.size.as_deref())
        .map_err(|e| ApiError::invalid(e.to_string(), request_id))?;
    if product.is_physical() && payload.shipping_address.is_none() {
        return Err(ApiError::invalid(
            "a shipping address is required for physical products",
            request_id,
        ));
    }
    if !product.is_physical() && payload.shipping_address.is_some() {
        return Err(ApiError::invalid(
            "digital orders carry no shipping address",
            request_id,
        ));
    }

    let generation = state
        .db
        .generation(generation_id)
        .map_err(|e| ApiError::internal(e.to_string(), request_id))?
        .ok_or_else(|| ApiError::not_found("generation", request_id))?;
    if generation.status != GenerationStatus::Completed {
        return Err(ApiError::invalid(
            "the portrait has not been generated yet",
            request_id,
        ));
    }

    let customer = state
        .db
        .upsert_customer(&payload.customer)
        .map_err(|e| ApiError::internal(e.to_string(), request_id))?;

    let size_label = payload
        .size
        .as_deref()
        .map(|s| format!(" - {s}"))
        .unwrap_or_default();
    let charge = state
        .gateway
        .create_charge(&CreateChargeRequest {
            amount_cents: spec.price_cents,
            description: format!("{}{size_label}", spec.name),
            expires_in: state.api.charge_expires_in,
            customer: ChargeCustomer {
                name: customer.name.clone(),
                cellphone: customer.cellphone.clone(),
                email: customer.email.clone(),
                tax_id: customer.tax_id.clone(),
            },
        })
        .await
        .map_err(|e| ApiError::upstream(e.to_string(), request_id))?;

    if let Some(gateway_customer_id) = &charge.customer_id {
        if let Err(err) = state
            .db
            .set_gateway_customer_id(customer.id, gateway_customer_id)
        {
            warn!(customer = %customer.id, "failed to record gateway customer id: {err}");
        }
    }

    let order = Order {
        id: OrderId::generate(),
        generation_id,
        customer_id: customer.id,
        product,
        size: payload.size,
        price_cents: spec.price_cents,
        status: OrderStatus::PendingPayment,
        charge_id: charge.id.clone(),
        shipping_address: payload.shipping_address,
        tracking_code: None,
        notes: None,
        created_at: Utc::now(),
        paid_at: None,
        shipped_at: None,
    };
    state
        .db
        .insert_order(&order)
        .map_err(|e| ApiError::internal(e.to_string(), request_id))?;
    info!(order = %order.id, charge = %charge.id, product = %product, "order created");

    Ok(json!({
        "order_id": order.id,
        "pix_id": charge.id,
        "br_code": charge.br_code,
        "br_code_base64": charge.br_code_base64,
        "amount_cents": charge.amount_cents,
        "expires_at": charge.expires_at,
    }))
}
