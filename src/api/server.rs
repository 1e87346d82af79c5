//! SheetDesk HTTP server
//!
//! Axum router for upload, edit, save and download, plus the optional login
//! gate and the database mirror wiring.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use super::auth::{self, SessionStore};
use super::handlers;
use crate::config::ServerConfig;
use crate::db::{LogMirror, SqlMirror};
use crate::error::SheetResult;
use crate::registry::{MemoryRegistry, UploadStore};
use crate::storage::UploadDir;

/// Shared application state
pub struct AppState {
    pub version: String,
    pub registry: Arc<dyn UploadStore>,
    pub uploads: UploadDir,
    pub mirror: Option<Arc<dyn LogMirror>>,
    pub sessions: Option<SessionStore>,
    pub max_upload_bytes: usize,
}

impl AppState {
    /// State with an empty in-memory registry, no mirror and no login gate
    pub fn new(uploads: UploadDir) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            registry: Arc::new(MemoryRegistry::new()),
            uploads,
            mirror: None,
            sessions: None,
            max_upload_bytes: ServerConfig::default().max_upload_bytes,
        }
    }

    pub fn with_registry(mut self, registry: Arc<dyn UploadStore>) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_mirror(mut self, mirror: Arc<dyn LogMirror>) -> Self {
        self.mirror = Some(mirror);
        self
    }

    pub fn with_sessions(mut self, sessions: SessionStore) -> Self {
        self.sessions = Some(sessions);
        self
    }

    pub fn with_max_upload_bytes(mut self, bytes: usize) -> Self {
        self.max_upload_bytes = bytes;
        self
    }

    /// Build the state a running server uses
    pub fn from_config(config: &ServerConfig) -> SheetResult<Self> {
        let uploads = UploadDir::create(&config.upload_dir)?;
        let mut state = Self::new(uploads).with_max_upload_bytes(config.max_upload_bytes);

        if config.mirror.is_enabled() {
            match config.db.url() {
                Some(url) => {
                    let mut mirror = SqlMirror::connect_lazy(&url, config.mirror)?;
                    if let Some((attribute, value)) = config.pair_columns.clone() {
                        mirror = mirror.with_pair_columns(attribute, value);
                    }
                    info!(
                        mode = ?config.mirror,
                        url = %config.db.redacted_url().unwrap_or_default(),
                        "database mirror enabled"
                    );
                    state = state.with_mirror(Arc::new(mirror));
                }
                None => warn!("mirror requested but no database configured; saves will not be logged"),
            }
        }

        if let Some(login) = config.login.clone() {
            info!(user = %login.user, ttl_secs = login.session_ttl.as_secs(), "login gate enabled");
            state = state.with_sessions(SessionStore::new(login));
        }

        Ok(state)
    }

    pub fn login_enabled(&self) -> bool {
        self.sessions.is_some()
    }
}

/// Build the router over `state`
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let sheets = Router::new()
        .route("/upload", post(handlers::upload))
        .route("/edit", get(handlers::edit))
        .route("/save", post(handlers::save))
        .route("/download", get(handlers::download))
        .route("/files", get(handlers::list_files))
        .route("/files/:filename", delete(handlers::evict_file))
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            auth::require_auth,
        ));

    Router::new()
        .route("/", get(handlers::index))
        .route("/health", get(handlers::health))
        .route("/version", get(handlers::version))
        .route("/login", get(auth::login_page).post(auth::login))
        .route("/logout", get(auth::logout))
        .merge(sheets)
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(state.max_upload_bytes))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Run the server until SIGINT/SIGTERM
pub async fn run_api_server(config: ServerConfig) -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "royalbit_sheetdesk=info,sheetdesk=info,tower_http=info".into()),
        )
        .init();

    let state = Arc::new(AppState::from_config(&config)?);
    let app = build_router(Arc::clone(&state));

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("📊 SheetDesk starting on http://{}", addr);
    info!("   Uploads: {}", state.uploads.root().display());
    info!("   Endpoints: /upload, /edit, /save, /download, /files");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("SheetDesk shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, stopping server...");
}
