//! In-memory stand-ins for the three remote dependencies, used by the
//! handler tests and available to downstream integration harnesses.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use retrato_model::{PixStatus, PortraitStyle};
use tokio::sync::Mutex;

use crate::clients::{
    CreateChargeRequest, EngineError, GatewayError, MailError, Mailer, OutboundEmail, PixCharge,
    PixChargeState, PixGateway, PortraitEngine,
};

pub struct FakePortraitEngine {
    pub output: Vec<u8>,
    pub fail: bool,
    pub render_calls: AtomicU64,
}

impl FakePortraitEngine {
    #[must_use]
    pub fn returning(output: Vec<u8>) -> Self {
        Self {
            output,
            fail: false,
            render_calls: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn failing() -> Self {
        Self {
            output: Vec::new(),
            fail: true,
            render_calls: AtomicU64::new(0),
        }
    }
}

#[async_trait]
impl PortraitEngine for FakePortraitEngine {
    async fn render(
        &self,
        _image: &[u8],
        _mime: &str,
        _style: PortraitStyle,
    ) -> Result<Vec<u8>, EngineError> {
        self.render_calls.fetch_add(1, Ordering::Relaxed);
        if self.fail {
            return Err(EngineError("engine unavailable".to_string()));
        }
        Ok(self.output.clone())
    }
}

pub struct FakePixGateway {
    pub status: Mutex<PixStatus>,
    pub fail_create: bool,
    pub create_calls: AtomicU64,
    pub status_calls: AtomicU64,
    pub last_charge: Mutex<Option<CreateChargeRequest>>,
}

impl Default for FakePixGateway {
    fn default() -> Self {
        Self {
            status: Mutex::new(PixStatus::Pending),
            fail_create: false,
            create_calls: AtomicU64::new(0),
            status_calls: AtomicU64::new(0),
            last_charge: Mutex::new(None),
        }
    }
}

#[async_trait]
impl PixGateway for FakePixGateway {
    async fn create_charge(
        &self,
        request: &CreateChargeRequest,
    ) -> Result<PixCharge, GatewayError> {
        let call = self.create_calls.fetch_add(1, Ordering::Relaxed) + 1;
        if self.fail_create {
            return Err(GatewayError("gateway rejected the charge".to_string()));
        }
        *self.last_charge.lock().await = Some(request.clone());
        Ok(PixCharge {
            id: format!("pix_char_{call}"),
            br_code: "00020126580014br.gov.bcb.pix".to_string(),
            br_code_base64: "data:image/png;base64,ZmFrZS1xcg==".to_string(),
            amount_cents: request.amount_cents,
            status: PixStatus::Pending,
            expires_at: Some("2026-12-31T23:59:59Z".to_string()),
            customer_id: Some("cust_fake".to_string()),
        })
    }

    async fn charge_status(&self, _charge_id: &str) -> Result<PixChargeState, GatewayError> {
        self.status_calls.fetch_add(1, Ordering::Relaxed);
        Ok(PixChargeState {
            status: *self.status.lock().await,
            expires_at: Some("2026-12-31T23:59:59Z".to_string()),
        })
    }
}

#[derive(Default)]
pub struct FakeMailer {
    pub fail: bool,
    pub sent: Mutex<Vec<OutboundEmail>>,
}

impl FakeMailer {
    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail: true,
            sent: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Mailer for FakeMailer {
    async fn send(&self, email: &OutboundEmail) -> Result<(), MailError> {
        if self.fail {
            return Err(MailError("smtp relay down".to_string()));
        }
        self.sent.lock().await.push(email.clone());
        Ok(())
    }
}
