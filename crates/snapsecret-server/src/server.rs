use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::{
    routing::{get, post, put},
    Router,
};
use directories::ProjectDirs;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::{
    clock::{Clock, SystemClock},
    handlers::{get_secret, health, put_secret, upload_target},
    lifecycle::{Lifecycle, DEFAULT_STORAGE_TIMEOUT},
    store::{db::DEFAULT_TABLE, spawn_sweep, MemoryStore, RedbStore, SecretStore},
    upload::{S3Config, S3Presigner, UploadBroker},
    AppState,
};

/// File name of the redb database inside the data directory.
pub const DB_FILE: &str = "snapsecret.db";

pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub data_dir: Option<PathBuf>,
    /// Table holding secret records ($SNAPSECRET_SECRETS_TABLE).
    pub table: String,
    /// Keep records in process memory instead of on disk.
    pub in_memory: bool,
    pub s3: S3Config,
    pub cors_origins: Option<String>,
    pub sweep_interval: Duration,
    /// Bound on each store and signing call.
    pub storage_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: std::env::var("SNAPSECRET_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: std::env::var("SNAPSECRET_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            data_dir: std::env::var("SNAPSECRET_DATA_DIR").ok().map(PathBuf::from),
            table: std::env::var("SNAPSECRET_SECRETS_TABLE")
                .ok()
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| DEFAULT_TABLE.into()),
            in_memory: false,
            s3: S3Config::from_env(),
            cors_origins: std::env::var("SNAPSECRET_CORS_ORIGINS").ok(),
            sweep_interval: Duration::from_secs(
                std::env::var("SNAPSECRET_SWEEP_INTERVAL_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(300),
            ),
            storage_timeout: std::env::var("SNAPSECRET_STORAGE_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_STORAGE_TIMEOUT),
        }
    }
}

/// Resolve the data directory, creating it if needed. Without an explicit
/// directory this is the platform app data dir (`~/.local/share/snapsecret/`).
pub fn resolve_data_dir(data_dir: Option<&PathBuf>) -> Result<PathBuf> {
    let path = match data_dir {
        Some(d) => d.clone(),
        None => ProjectDirs::from("", "", "snapsecret")
            .context("could not determine platform data directory")?
            .data_dir()
            .to_owned(),
    };
    std::fs::create_dir_all(&path)
        .with_context(|| format!("create data dir: {}", path.display()))?;
    Ok(path)
}

/// Open the on-disk store described by `cfg`.
pub fn open_redb(cfg: &ServerConfig) -> Result<RedbStore> {
    let data_dir = resolve_data_dir(cfg.data_dir.as_ref())?;
    info!(data_dir = %data_dir.display(), table = %cfg.table, "using data directory");
    RedbStore::open_table(&data_dir.join(DB_FILE), &cfg.table).context("open store")
}

pub async fn run(cfg: ServerConfig) -> Result<()> {
    let store: Arc<dyn SecretStore> = if cfg.in_memory {
        warn!("using in-memory store; secrets are lost on restart");
        Arc::new(MemoryStore::new())
    } else {
        Arc::new(open_redb(&cfg)?)
    };
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    spawn_sweep(store.clone(), clock.clone(), cfg.sweep_interval);

    if cfg.s3.bucket.is_none() {
        warn!("SNAPSECRET_BUCKET is not set; file secrets will fail to presign");
    }
    let broker = UploadBroker::new(Arc::new(S3Presigner::new(cfg.s3.clone())), clock.clone())
        .with_timeout(cfg.storage_timeout);
    let engine = Lifecycle::new(store, broker, clock).with_storage_timeout(cfg.storage_timeout);

    let app = build_router(AppState { engine }, cfg.cors_origins.as_deref());

    let addr: SocketAddr = format!("{}:{}", cfg.host, cfg.port)
        .parse()
        .context("invalid host/port")?;

    info!(%addr, "snapsecret server listening");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("bind listener")?;

    axum::serve(listener, app).await.context("server error")
}

pub fn build_router(state: AppState, cors_origins: Option<&str>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/secret", put(put_secret))
        .route("/secret/{secret_id}", get(get_secret))
        .route("/upload", post(upload_target))
        .with_state(state)
        .layer(build_cors(cors_origins))
        .layer(TraceLayer::new_for_http())
}

fn build_cors(origins: Option<&str>) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([
            http::Method::GET,
            http::Method::PUT,
            http::Method::POST,
            http::Method::OPTIONS,
        ])
        .allow_headers(Any);

    match origins {
        Some(o) if !o.split(',').any(|s| s.trim() == "*") => {
            let origins: Vec<_> = o.split(',').filter_map(|s| s.trim().parse().ok()).collect();
            cors.allow_origin(origins)
        }
        _ => cors.allow_origin(Any),
    }
}
