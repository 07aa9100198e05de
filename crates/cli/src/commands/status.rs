//! `mnemo status`: show config and worker status.

use std::path::Path;

use mnemo_client::WorkerReply;

pub async fn run(config_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path)?;

    println!("mnemo status");
    println!("============");
    println!("  Config:       {}", config_path.display());
    println!("  Data dir:     {}", config.storage.data_dir().display());
    println!("  Database:     {}", config.storage.database_url());
    println!("  Worker:       {}", config.worker.base_url());
    println!(
        "  Injection:    {} ({} tokens, types: {})",
        if config.context.enabled { "enabled" } else { "disabled" },
        config.context.max_tokens,
        config
            .context
            .include_types
            .iter()
            .map(|t| t.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );

    if !config_path.exists() {
        println!("\n  ⚠️  No config file, run `mnemo init` first");
    }

    let client = super::worker_client(&config)?;
    match client.health().await {
        WorkerReply::Ready(health) => {
            println!("\n  ✅ Worker running (v{})", health.version);
            if let WorkerReply::Ready(stats) = client.stats().await {
                println!("  Sessions:     {} ({} open)", stats.sessions, stats.open_sessions);
                println!("  Observations: {}", stats.observations);
            }
        }
        WorkerReply::Rejected { status, message } => {
            println!("\n  ⚠️  Worker answered {status}: {message}");
        }
        WorkerReply::Unavailable { reason } => {
            println!("\n  ❌ Worker not reachable: {reason}");
        }
    }

    Ok(())
}
