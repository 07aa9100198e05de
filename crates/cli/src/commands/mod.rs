//! Subcommand implementations.

pub mod context;
pub mod init;
pub mod search;
pub mod serve;
pub mod show;
pub mod status;
pub mod timeline;

use std::path::Path;

use mnemo_client::{WorkerClient, WorkerReply};
use mnemo_config::AppConfig;

type CmdResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

pub(crate) fn load_config(path: &Path) -> CmdResult<AppConfig> {
    tracing::debug!(path = %path.display(), "Loading config");
    Ok(AppConfig::load_from(path).map_err(|e| format!("Failed to load config: {e}"))?)
}

pub(crate) fn worker_client(config: &AppConfig) -> CmdResult<WorkerClient> {
    Ok(WorkerClient::from_config(&config.worker)
        .map_err(|e| format!("Failed to create HTTP client: {e}"))?)
}

/// Unwrap a reply for a command that cannot continue without it.
pub(crate) fn require<T>(reply: WorkerReply<T>, config: &AppConfig) -> CmdResult<T> {
    match reply {
        WorkerReply::Ready(value) => Ok(value),
        WorkerReply::Rejected { status, message } => {
            Err(format!("Worker rejected the request ({status}): {message}").into())
        }
        WorkerReply::Unavailable { reason } => Err(format!(
            "Memory worker not reachable at {} ({reason}). Start it with `mnemo serve`.",
            config.worker.base_url()
        )
        .into()),
    }
}
