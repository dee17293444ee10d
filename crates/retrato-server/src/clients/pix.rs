use std::fmt::{Display, Formatter};
use std::time::Duration;

use async_trait::async_trait;
use retrato_model::PixStatus;
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug)]
pub struct GatewayError(pub String);

impl Display for GatewayError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for GatewayError {}

/// Customer data forwarded to the gateway, in its camelCase vocabulary.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChargeCustomer {
    pub name: String,
    pub cellphone: String,
    pub email: String,
    pub tax_id: String,
}

#[derive(Debug, Clone)]
pub struct CreateChargeRequest {
    pub amount_cents: i64,
    pub description: String,
    pub expires_in: Duration,
    pub customer: ChargeCustomer,
}

/// A freshly created PIX charge: the copy-paste code, the QR image and the
/// gateway's view of the charge.
#[derive(Debug, Clone)]
pub struct PixCharge {
    pub id: String,
    pub br_code: String,
    pub br_code_base64: String,
    pub amount_cents: i64,
    pub status: PixStatus,
    pub expires_at: Option<String>,
    pub customer_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PixChargeState {
    pub status: PixStatus,
    pub expires_at: Option<String>,
}

#[async_trait]
pub trait PixGateway: Send + Sync + 'static {
    async fn create_charge(&self, request: &CreateChargeRequest)
        -> Result<PixCharge, GatewayError>;
    async fn charge_status(&self, charge_id: &str) -> Result<PixChargeState, GatewayError>;
}

/// Responses arrive as `{ data, error }` envelopes; a non-null `error` is a
/// gateway failure even on HTTP 200.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: Option<T>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChargeData {
    id: String,
    br_code: String,
    br_code_base64: String,
    amount: i64,
    status: PixStatus,
    #[serde(default)]
    expires_at: Option<String>,
    #[serde(default)]
    customer: Option<GatewayCustomer>,
}

#[derive(Debug, Deserialize)]
struct GatewayCustomer {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusData {
    status: PixStatus,
    #[serde(default)]
    expires_at: Option<String>,
}

pub struct AbacatePixGateway {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl AbacatePixGateway {
    #[must_use]
    pub fn new(base_url: String, api_key: String, timeout: Duration) -> Self {
        Self {
            base_url,
            api_key,
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
        }
    }

    async fn unwrap_envelope<T>(
        response: reqwest::Response,
        operation: &str,
    ) -> Result<T, GatewayError>
    where
        T: for<'de> Deserialize<'de>,
    {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError(format!(
                "gateway {operation} failed ({status}): {body}"
            )));
        }
        let envelope: Envelope<T> = response
            .json()
            .await
            .map_err(|e| GatewayError(format!("gateway {operation} parse failed: {e}")))?;
        if let Some(error) = envelope.error {
            return Err(GatewayError(format!("gateway {operation} error: {error}")));
        }
        envelope
            .data
            .ok_or_else(|| GatewayError(format!("gateway {operation} returned no data")))
    }
}

#[async_trait]
impl PixGateway for AbacatePixGateway {
    async fn create_charge(
        &self,
        request: &CreateChargeRequest,
    ) -> Result<PixCharge, GatewayError> {
        let response = self
            .client
            .post(format!(
                "{}/v1/pixQrCode/create",
                self.base_url.trim_end_matches('/')
            ))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "amount": request.amount_cents,
                "description": request.description,
                "expiresIn": request.expires_in.as_secs(),
                "customer": request.customer,
            }))
            .send()
            .await
            .map_err(|e| GatewayError(format!("gateway create request failed: {e}")))?;

        let data: ChargeData = Self::unwrap_envelope(response, "create").await?;
        Ok(PixCharge {
            id: data.id,
            br_code: data.br_code,
            br_code_base64: data.br_code_base64,
            amount_cents: data.amount,
            status: data.status,
            expires_at: data.expires_at,
            customer_id: data.customer.map(|c| c.id),
        })
    }

    async fn charge_status(&self, charge_id: &str) -> Result<PixChargeState, GatewayError> {
        let response = self
            .client
            .get(format!(
                "{}/v1/pixQrCode/check",
                self.base_url.trim_end_matches('/')
            ))
            .query(&[("id", charge_id)])
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| GatewayError(format!("gateway status request failed: {e}")))?;

        let data: StatusData = Self::unwrap_envelope(response, "status").await?;
        Ok(PixChargeState {
            status: data.status,
            expires_at: data.expires_at,
        })
    }
}
