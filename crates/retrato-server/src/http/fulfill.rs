use std::fmt::{Display, Formatter};

use chrono::Utc;
use retrato_core::OrderId;
use retrato_model::{format_brl, product_spec, OrderStatus, ProductKind};
use tracing::{info, warn};

use crate::clients::email;
use crate::AppState;

#[derive(Debug)]
pub(crate) struct FulfillError(pub String);

impl Display for FulfillError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for FulfillError {}

impl From<retrato_store::StoreError> for FulfillError {
    fn from(err: retrato_store::StoreError) -> Self {
        Self(err.to_string())
    }
}

/// Runs once per order, no matter how many times the poll loop or the
/// webhook report the payment: the guarded `pending_payment` transition in
/// the store picks a single winner, every later call is a no-op.
///
/// Digital orders get a signed download link by email and finish at
/// `delivered`; physical orders move to `processing` and get a confirmation
/// email. Mail failures are logged and swallowed.
pub(crate) async fn fulfill_order(state: &AppState, order_id: OrderId) -> Result<(), FulfillError> {
    let Some(order) = state.db.order(order_id)? else {
        warn!(order = %order_id, "fulfillment requested for unknown order");
        return Ok(());
    };

    let target_status = if order.product == ProductKind::Digital {
        OrderStatus::Paid
    } else {
        OrderStatus::Processing
    };
    if !state.db.mark_order_paid(order.id, target_status, Utc::now())? {
        return Ok(());
    }
    info!(order = %order.id, product = %order.product, "order marked as paid");

    let Some(customer) = state.db.customer(order.customer_id)? else {
        warn!(order = %order.id, "customer missing during fulfillment");
        return Ok(());
    };

    if order.product == ProductKind::Digital {
        let Some(generation) = state.db.generation(order.generation_id)? else {
            warn!(order = %order.id, "generation missing during fulfillment");
            return Ok(());
        };
        if generation.generated_path.is_none() {
            warn!(order = %order.id, "clean portrait missing during fulfillment");
            return Ok(());
        }

        let expires_unix = Utc::now().timestamp() + state.api.download_ttl.as_secs() as i64;
        let download_url =
            state
                .signer
                .download_url(&state.api.public_base_url, order.id, expires_unix);

        let message = email::download_email(&customer.email, &customer.name, &download_url);
        if let Err(err) = state.mailer.send(&message).await {
            warn!(order = %order.id, "failed to send download email: {err}");
        } else {
            info!(order = %order.id, to = %customer.email, "download email sent");
        }

        state.db.set_order_notes_and_status(
            order.id,
            &format!("Download URL (7 dias): {download_url}"),
            OrderStatus::Delivered,
        )?;
    } else {
        let spec = product_spec(order.product);
        let message = email::confirmation_email(
            &customer.email,
            &customer.name,
            spec.name,
            &format_brl(order.price_cents),
            &order.id.to_string(),
        );
        if let Err(err) = state.mailer.send(&message).await {
            warn!(order = %order.id, "failed to send confirmation email: {err}");
        } else {
            info!(order = %order.id, to = %customer.email, "confirmation email sent");
        }
    }

    Ok(())
}
