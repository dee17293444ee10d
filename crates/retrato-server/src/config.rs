use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

pub const CONFIG_SCHEMA_VERSION: &str = "1";

#[derive(Debug, Clone, Serialize)]
pub struct ApiConfig {
    pub public_base_url: String,
    pub data_dir: PathBuf,
    pub media_root: PathBuf,
    pub max_body_bytes: usize,
    pub max_upload_bytes: usize,
    pub request_timeout: Duration,
    pub admin_key: String,
    pub signing_secret: String,
    pub webhook_secret: Option<String>,
    pub admin_page_size: u32,
    pub download_ttl: Duration,
    pub account_link_ttl: Duration,
    pub charge_expires_in: Duration,
    pub allow_simulated_payments: bool,
    pub watermark_text: String,
    pub engine_base_url: String,
    pub engine_api_key: String,
    pub engine_model: String,
    pub engine_timeout: Duration,
    pub gateway_base_url: String,
    pub gateway_api_key: String,
    pub gateway_timeout: Duration,
    pub mailer_base_url: String,
    pub mailer_api_key: String,
    pub mailer_from: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            public_base_url: "http://localhost:8080".to_string(),
            data_dir: PathBuf::from("artifacts/data"),
            media_root: PathBuf::from("artifacts/media"),
            max_body_bytes: 12 * 1024 * 1024,
            max_upload_bytes: 10 * 1024 * 1024,
            request_timeout: Duration::from_secs(75),
            admin_key: String::new(),
            signing_secret: String::new(),
            webhook_secret: None,
            admin_page_size: 20,
            download_ttl: Duration::from_secs(7 * 24 * 60 * 60),
            account_link_ttl: Duration::from_secs(15 * 60),
            charge_expires_in: Duration::from_secs(3600),
            allow_simulated_payments: false,
            watermark_text: "RETRATO".to_string(),
            engine_base_url: "https://api.aimlapi.com".to_string(),
            engine_api_key: String::new(),
            engine_model: "google/gemini-2.5-flash-image-edit".to_string(),
            engine_timeout: Duration::from_secs(60),
            gateway_base_url: "https://api.abacatepay.com".to_string(),
            gateway_api_key: String::new(),
            gateway_timeout: Duration::from_secs(15),
            mailer_base_url: "https://api.resend.com".to_string(),
            mailer_api_key: String::new(),
            mailer_from: "Retrato <pedidos@retrato.app>".to_string(),
        }
    }
}

pub fn validate_startup_config_contract(api: &ApiConfig) -> Result<(), String> {
    if api.max_body_bytes == 0 || api.max_upload_bytes == 0 {
        return Err("body limits must be > 0".to_string());
    }
    if api.max_upload_bytes > api.max_body_bytes {
        return Err("upload limit must fit inside the body limit".to_string());
    }
    if api.request_timeout.is_zero() || api.engine_timeout.is_zero() {
        return Err("timeouts must be > 0".to_string());
    }
    if api.admin_key.trim().is_empty() {
        return Err("admin_key must be configured".to_string());
    }
    if api.signing_secret.trim().len() < 16 {
        return Err("signing_secret must be at least 16 bytes".to_string());
    }
    if api.admin_page_size == 0 {
        return Err("admin_page_size must be > 0".to_string());
    }
    if api.download_ttl.is_zero() || api.account_link_ttl.is_zero() {
        return Err("signed-link lifetimes must be > 0".to_string());
    }
    if api.public_base_url.trim_end_matches('/').is_empty() {
        return Err("public_base_url must be configured".to_string());
    }
    if api.watermark_text.trim().is_empty() {
        return Err("watermark_text must not be empty".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> ApiConfig {
        ApiConfig {
            admin_key: "adm-secret".to_string(),
            signing_secret: "0123456789abcdef0123456789abcdef".to_string(),
            ..ApiConfig::default()
        }
    }

    #[test]
    fn startup_config_validation_requires_secrets() {
        let mut api = valid_config();
        assert!(validate_startup_config_contract(&api).is_ok());

        api.admin_key = String::new();
        let err = validate_startup_config_contract(&api).expect_err("missing admin key");
        assert!(err.contains("admin_key"));

        let mut api = valid_config();
        api.signing_secret = "short".to_string();
        let err = validate_startup_config_contract(&api).expect_err("weak signing secret");
        assert!(err.contains("signing_secret"));
    }

    #[test]
    fn startup_config_validation_checks_limit_ordering() {
        let mut api = valid_config();
        api.max_upload_bytes = api.max_body_bytes + 1;
        let err = validate_startup_config_contract(&api).expect_err("upload > body");
        assert!(err.contains("upload limit"));
    }
}
