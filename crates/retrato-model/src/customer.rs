// SPDX-License-Identifier: Apache-2.0

use chrono::{DateTime, Utc};
use retrato_core::CustomerId;
use serde::{Deserialize, Serialize};

use crate::product::ModelError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Customer {
    pub id: CustomerId,
    pub name: String,
    pub email: String,
    pub cellphone: String,
    pub tax_id: String,
    pub gateway_customer_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Checkout-supplied customer data, before it is reconciled with an existing
/// row by email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CustomerDraft {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub cellphone: String,
    pub tax_id: String,
}

impl CustomerDraft {
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.name.trim().is_empty() {
            return Err(ModelError::MissingField("name"));
        }
        if self.email.trim().is_empty() {
            return Err(ModelError::MissingField("email"));
        }
        if !self.email.contains('@') || self.email.trim() != self.email {
            return Err(ModelError::InvalidEmail(self.email.clone()));
        }
        if self.tax_id.trim().is_empty() {
            return Err(ModelError::MissingField("tax_id"));
        }
        Ok(())
    }

    /// Greeting form used by outbound mail.
    #[must_use]
    pub fn first_name(&self) -> &str {
        self.name.split_whitespace().next().unwrap_or(&self.name)
    }
}
