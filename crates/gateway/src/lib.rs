//! HTTP worker for mnemo.
//!
//! Serves the memory engine over a local REST API so agent hooks, the
//! CLI and other tools share one store. Built on Axum.

pub mod api;

use axum::extract::DefaultBodyLimit;
use axum::{Router, response::Json, routing::get};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

use mnemo_config::AppConfig;
use mnemo_engine::MemoryEngine;
use mnemo_memory::SqliteStore;

/// Request bodies above this size are rejected before parsing.
const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Shared application state for the worker.
pub struct AppState {
    pub engine: MemoryEngine,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(engine: MemoryEngine) -> SharedState {
        Arc::new(Self { engine })
    }
}

/// Build the Axum router with every worker route.
pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .nest("/api", api::api_router(state))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// Serve on an already-bound listener until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, state: SharedState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown)
        .await
}

/// Open the configured store and run the worker until Ctrl-C.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    if config.storage.database != ":memory:" {
        std::fs::create_dir_all(config.storage.data_dir())?;
    }
    let store = SqliteStore::new(&config.storage.database_url()).await?;
    let engine = MemoryEngine::new(Arc::new(store), &config);

    let addr = config.worker.bind_addr();
    let listener = TcpListener::bind(&addr).await?;
    info!(addr = %addr, "Worker listening");

    serve(listener, AppState::new(engine), shutdown_signal()).await?;
    info!("Worker stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown requested"),
        Err(e) => {
            warn!(error = %e, "Cannot listen for Ctrl-C; running until killed");
            std::future::pending::<()>().await;
        }
    }
}

// --- Handlers ---

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}
