//! `mnemo context`: print the context a new session would receive.

use std::path::Path;

pub async fn run(
    config_path: &Path,
    project: Option<String>,
    max_tokens: Option<usize>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path)?;
    let client = super::worker_client(&config)?;

    let context = super::require(
        client.context(project.as_deref(), max_tokens).await,
        &config,
    )?;

    if context.observations.is_empty() {
        println!("(no observations selected)");
    } else {
        println!("{}", context.context_text);
    }
    eprintln!(
        "\n{} observation(s), ~{} tokens",
        context.observations.len(),
        context.total_tokens
    );
    Ok(())
}
