//! `mnemo show`: full detail for observations by id.

use std::path::Path;

pub async fn run(config_path: &Path, ids: Vec<i64>) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path)?;
    let client = super::worker_client(&config)?;

    let observations = super::require(client.get_observations(&ids).await, &config)?;
    let missing: Vec<i64> = ids
        .iter()
        .copied()
        .filter(|id| !observations.iter().any(|o| o.id == *id))
        .collect();

    println!("{}", serde_json::to_string_pretty(&observations)?);
    if !missing.is_empty() {
        eprintln!("Not found: {missing:?}");
    }
    Ok(())
}
