// SPDX-License-Identifier: Apache-2.0

use std::fmt::{Display, Formatter};

use chrono::{DateTime, Utc};
use retrato_core::{CustomerId, GenerationId, OrderId};
use serde::{Deserialize, Serialize};

use crate::product::{ModelError, ProductKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    PendingPayment,
    Paid,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn parse(input: &str) -> Result<Self, ModelError> {
        match input {
            "pending_payment" => Ok(Self::PendingPayment),
            "paid" => Ok(Self::Paid),
            "processing" => Ok(Self::Processing),
            "shipped" => Ok(Self::Shipped),
            "delivered" => Ok(Self::Delivered),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(ModelError::UnknownStatus(other.to_string())),
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PendingPayment => "pending_payment",
            Self::Paid => "paid",
            Self::Processing => "processing",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }

    /// Download access and fulfillment side effects require payment to have
    /// cleared; everything from `paid` onward qualifies.
    #[must_use]
    pub const fn is_paid_or_later(self) -> bool {
        matches!(
            self,
            Self::Paid | Self::Processing | Self::Shipped | Self::Delivered
        )
    }
}

impl Display for OrderStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ShippingAddress {
    pub street: String,
    pub number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complement: Option<String>,
    pub neighborhood: String,
    pub city: String,
    pub state: String,
    pub zip: String,
}

/// One purchase of one generation. `charge_id` ties the row to the PIX
/// charge at the payment gateway; `paid_at`/`shipped_at` are stamped by the
/// fulfillment and admin flows respectively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Order {
    pub id: OrderId,
    pub generation_id: GenerationId,
    pub customer_id: CustomerId,
    pub product: ProductKind,
    pub size: Option<String>,
    pub price_cents: i64,
    pub status: OrderStatus,
    pub charge_id: String,
    pub shipping_address: Option<ShippingAddress>,
    pub tracking_code: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub shipped_at: Option<DateTime<Utc>>,
}
