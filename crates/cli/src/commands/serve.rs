//! `mnemo serve`: run the memory worker until Ctrl-C.

use std::path::Path;

pub async fn run(config_path: &Path, port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = super::load_config(config_path)?;

    if let Some(port) = port_override {
        config.worker.port = port;
    }
    config.validate()?;

    println!("mnemo worker");
    println!("   Listening: {}", config.worker.base_url());
    println!("   Database:  {}", config.storage.database_url());
    println!(
        "   Context:   {} (max {} tokens)",
        if config.context.enabled { "enabled" } else { "disabled" },
        config.context.max_tokens
    );

    mnemo_gateway::start(config).await?;

    Ok(())
}
