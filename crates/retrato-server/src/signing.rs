use hmac::{Hmac, Mac};
use retrato_core::OrderId;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Signs and verifies the short-lived capability URLs this service hands
/// out: download links (minted by fulfillment and by the account view) and
/// account links. Payloads are purpose-scoped so a token for one cannot be
/// replayed as the other.
pub struct UrlSigner {
    key: Vec<u8>,
}

impl UrlSigner {
    #[must_use]
    pub fn new(secret: &str) -> Self {
        Self {
            key: secret.as_bytes().to_vec(),
        }
    }

    #[must_use]
    pub fn sign_download(&self, order: OrderId, expires_unix: i64) -> String {
        self.sign(&format!("download:{order}:{expires_unix}"))
    }

    #[must_use]
    pub fn verify_download(
        &self,
        order: OrderId,
        expires_unix: i64,
        signature: &str,
        now_unix: i64,
    ) -> bool {
        now_unix <= expires_unix
            && constant_time_eq(
                self.sign_download(order, expires_unix).as_bytes(),
                signature.as_bytes(),
            )
    }

    #[must_use]
    pub fn sign_account(&self, email: &str, expires_unix: i64) -> String {
        self.sign(&format!("account:{email}:{expires_unix}"))
    }

    #[must_use]
    pub fn verify_account(
        &self,
        email: &str,
        expires_unix: i64,
        signature: &str,
        now_unix: i64,
    ) -> bool {
        now_unix <= expires_unix
            && constant_time_eq(
                self.sign_account(email, expires_unix).as_bytes(),
                signature.as_bytes(),
            )
    }

    #[must_use]
    pub fn download_url(&self, base_url: &str, order: OrderId, expires_unix: i64) -> String {
        let signature = self.sign_download(order, expires_unix);
        format!(
            "{}/v1/download?order={order}&exp={expires_unix}&sig={signature}",
            base_url.trim_end_matches('/')
        )
    }

    fn sign(&self, payload: &str) -> String {
        let mut mac =
            HmacSha256::new_from_slice(&self.key).expect("hmac accepts any key length");
        mac.update(payload.as_bytes());
        mac.finalize()
            .into_bytes()
            .iter()
            .fold(String::with_capacity(64), |mut out, byte| {
                use std::fmt::Write;
                let _ = write!(out, "{byte:02x}");
                out
            })
    }
}

/// Comparison that does not leak the matching prefix length.
#[must_use]
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
