//! `mnemo timeline`: observations recorded around one observation.

use std::path::Path;

pub async fn run(config_path: &Path, id: i64, hours: f64) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path)?;
    let client = super::worker_client(&config)?;

    let timeline = super::require(client.timeline(id, Some(hours)).await, &config)?;
    if timeline.observations.is_empty() {
        println!("No observation #{id}, or nothing recorded around it.");
        return Ok(());
    }

    for observation in &timeline.observations {
        let marker = if observation.id == timeline.center_id { ">" } else { " " };
        println!(
            "{marker} #{:<6} {}  {:<13} {}",
            observation.id,
            observation.created_at.format("%Y-%m-%d %H:%M:%S"),
            observation.obs_type.as_str(),
            observation.display_text()
        );
    }
    Ok(())
}
