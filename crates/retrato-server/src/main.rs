#![forbid(unsafe_code)]

use std::env;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use retrato_server::clients::{AbacatePixGateway, AimlPortraitEngine, RestMailer};
use retrato_server::{build_router, validate_startup_config_contract, ApiConfig, AppState};
use retrato_store::{Db, MediaStore};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn env_bool(name: &str, default: bool) -> bool {
    env::var(name)
        .ok()
        .and_then(|v| match v.as_str() {
            "1" | "true" | "TRUE" | "yes" | "YES" => Some(true),
            "0" | "false" | "FALSE" | "no" | "NO" => Some(false),
            _ => None,
        })
        .unwrap_or(default)
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}

fn env_usize(name: &str, default: usize) -> usize {
    env::var(name)
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(default)
}

fn env_u32(name: &str, default: u32) -> u32 {
    env::var(name)
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(default)
}

fn env_duration_ms(name: &str, default_ms: u64) -> Duration {
    Duration::from_millis(env_u64(name, default_ms))
}

fn env_string(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_opt(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if env_bool("RETRATO_LOG_JSON", true) {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).expect("register SIGTERM");
        let mut sigint = signal(SignalKind::interrupt()).expect("register SIGINT");
        tokio::select! {
            _ = sigterm.recv() => {}
            _ = sigint.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

fn load_config() -> ApiConfig {
    let defaults = ApiConfig::default();
    ApiConfig {
        public_base_url: env_string("RETRATO_PUBLIC_BASE_URL", &defaults.public_base_url),
        data_dir: PathBuf::from(env_string("RETRATO_DATA_DIR", "artifacts/data")),
        media_root: PathBuf::from(env_string("RETRATO_MEDIA_ROOT", "artifacts/media")),
        max_body_bytes: env_usize("RETRATO_MAX_BODY_BYTES", defaults.max_body_bytes),
        max_upload_bytes: env_usize("RETRATO_MAX_UPLOAD_BYTES", defaults.max_upload_bytes),
        request_timeout: env_duration_ms("RETRATO_REQUEST_TIMEOUT_MS", 75_000),
        admin_key: env_string("RETRATO_ADMIN_KEY", ""),
        signing_secret: env_string("RETRATO_SIGNING_SECRET", ""),
        webhook_secret: env_opt("RETRATO_WEBHOOK_SECRET"),
        admin_page_size: env_u32("RETRATO_ADMIN_PAGE_SIZE", defaults.admin_page_size),
        download_ttl: env_duration_ms("RETRATO_DOWNLOAD_TTL_MS", 7 * 24 * 60 * 60 * 1000),
        account_link_ttl: env_duration_ms("RETRATO_ACCOUNT_LINK_TTL_MS", 15 * 60 * 1000),
        charge_expires_in: env_duration_ms("RETRATO_CHARGE_EXPIRES_MS", 3_600_000),
        allow_simulated_payments: env_bool("RETRATO_ALLOW_SIMULATED_PAYMENTS", false),
        watermark_text: env_string("RETRATO_WATERMARK_TEXT", &defaults.watermark_text),
        engine_base_url: env_string("RETRATO_ENGINE_BASE_URL", &defaults.engine_base_url),
        engine_api_key: env_string("RETRATO_ENGINE_API_KEY", ""),
        engine_model: env_string("RETRATO_ENGINE_MODEL", &defaults.engine_model),
        engine_timeout: env_duration_ms("RETRATO_ENGINE_TIMEOUT_MS", 60_000),
        gateway_base_url: env_string("RETRATO_GATEWAY_BASE_URL", &defaults.gateway_base_url),
        gateway_api_key: env_string("RETRATO_GATEWAY_API_KEY", ""),
        gateway_timeout: env_duration_ms("RETRATO_GATEWAY_TIMEOUT_MS", 15_000),
        mailer_base_url: env_string("RETRATO_MAILER_BASE_URL", &defaults.mailer_base_url),
        mailer_api_key: env_string("RETRATO_MAILER_API_KEY", ""),
        mailer_from: env_string("RETRATO_MAILER_FROM", &defaults.mailer_from),
    }
}

#[tokio::main]
async fn main() -> Result<(), String> {
    init_tracing();

    let bind_addr = env_string("RETRATO_BIND", "0.0.0.0:8080");
    let api = load_config();
    validate_startup_config_contract(&api)?;

    let db = Arc::new(
        Db::open(&api.data_dir.join("retrato.sqlite3"))
            .map_err(|e| format!("store open failed: {e}"))?,
    );
    let media = Arc::new(MediaStore::new(api.media_root.clone()));

    let engine = Arc::new(AimlPortraitEngine::new(
        api.engine_base_url.clone(),
        api.engine_api_key.clone(),
        api.engine_model.clone(),
        api.engine_timeout,
    ));
    let gateway = Arc::new(AbacatePixGateway::new(
        api.gateway_base_url.clone(),
        api.gateway_api_key.clone(),
        api.gateway_timeout,
    ));
    let mailer = Arc::new(RestMailer::new(
        api.mailer_base_url.clone(),
        api.mailer_api_key.clone(),
        api.mailer_from.clone(),
    ));

    let state = AppState::new(db, media, engine, gateway, mailer, api);
    state.ready.store(true, Ordering::Relaxed);
    let app = build_router(state.clone());

    let addr: std::net::SocketAddr = bind_addr
        .parse()
        .map_err(|e| format!("invalid bind addr {bind_addr}: {e}"))?;
    let socket = if addr.is_ipv4() {
        tokio::net::TcpSocket::new_v4().map_err(|e| format!("socket v4 failed: {e}"))?
    } else {
        tokio::net::TcpSocket::new_v6().map_err(|e| format!("socket v6 failed: {e}"))?
    };
    socket
        .set_reuseaddr(true)
        .map_err(|e| format!("set_reuseaddr failed: {e}"))?;
    socket.bind(addr).map_err(|e| format!("bind failed: {e}"))?;
    let listener: TcpListener = socket
        .listen(1024)
        .map_err(|e| format!("listen failed: {e}"))?;
    info!("retrato-server listening on {bind_addr}");

    let ready = state.ready.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            wait_for_shutdown_signal().await;
            ready.store(false, Ordering::Relaxed);
            let drain_ms = env_u64("RETRATO_SHUTDOWN_DRAIN_MS", 3000);
            tokio::time::sleep(Duration::from_millis(drain_ms)).await;
        })
        .await
        .map_err(|e| format!("server failed: {e}"))
}
