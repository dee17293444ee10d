#![forbid(unsafe_code)]

use std::sync::atomic::{AtomicBool, AtomicU64};
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use retrato_store::{Db, MediaStore};

pub mod clients;
mod config;
mod error;
pub mod fakes;
mod http;
mod signing;
mod telemetry;
mod watermark;

use clients::{Mailer, PixGateway, PortraitEngine};
use telemetry::RequestMetrics;

pub const CRATE_NAME: &str = "retrato-server";

pub use config::{validate_startup_config_contract, ApiConfig, CONFIG_SCHEMA_VERSION};
pub use error::{ApiError, ApiErrorCode};
pub use signing::{constant_time_eq, UrlSigner};
pub use watermark::{apply_watermark, WatermarkError};

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Db>,
    pub media: Arc<MediaStore>,
    pub engine: Arc<dyn PortraitEngine>,
    pub gateway: Arc<dyn PixGateway>,
    pub mailer: Arc<dyn Mailer>,
    pub signer: Arc<UrlSigner>,
    pub api: Arc<ApiConfig>,
    pub ready: Arc<AtomicBool>,
    pub(crate) metrics: Arc<RequestMetrics>,
    pub(crate) request_id_seed: Arc<AtomicU64>,
}

impl AppState {
    #[must_use]
    pub fn new(
        db: Arc<Db>,
        media: Arc<MediaStore>,
        engine: Arc<dyn PortraitEngine>,
        gateway: Arc<dyn PixGateway>,
        mailer: Arc<dyn Mailer>,
        api: ApiConfig,
    ) -> Self {
        let signer = Arc::new(UrlSigner::new(&api.signing_secret));
        Self {
            db,
            media,
            engine,
            gateway,
            mailer,
            signer,
            api: Arc::new(api),
            ready: Arc::new(AtomicBool::new(true)),
            metrics: Arc::new(RequestMetrics::default()),
            request_id_seed: Arc::new(AtomicU64::new(1)),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(http::handlers::healthz_handler))
        .route("/readyz", get(http::handlers::readyz_handler))
        .route("/metrics", get(http::handlers::metrics_handler))
        .route("/v1/version", get(http::handlers::version_handler))
        .route("/v1/generate", post(http::generate::generate_handler))
        .route("/v1/preview/{id}", get(http::generate::preview_handler))
        .route("/v1/checkout", post(http::checkout::checkout_handler))
        .route("/v1/checkout/status", get(http::status::status_handler))
        .route("/v1/webhook", post(http::webhook::webhook_handler))
        .route(
            "/v1/admin/orders",
            get(http::admin::list_orders_handler).patch(http::admin::update_order_handler),
        )
        .route("/v1/account/orders", get(http::account::orders_handler))
        .route("/v1/download", get(http::download::download_handler))
        .layer(DefaultBodyLimit::max(state.api.max_body_bytes))
        .with_state(state)
}

#[cfg(test)]
mod http_tests;
