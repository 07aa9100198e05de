//! `mnemo search`: ranked search over recorded observations.

use std::path::Path;

use mnemo_core::observation::ObservationType;
use mnemo_core::store::SearchQuery;

pub async fn run(
    config_path: &Path,
    query: String,
    obs_type: Option<ObservationType>,
    limit: usize,
    project: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path)?;
    let client = super::worker_client(&config)?;

    let mut search = SearchQuery::new(query);
    search.obs_type = obs_type;
    search.limit = limit;
    search.project_path = project;

    let outcome = super::require(client.search(&search).await, &config)?;
    if let Some(error) = &outcome.error {
        return Err(error.clone().into());
    }
    if outcome.results.is_empty() {
        println!("No matches for \"{}\"", outcome.query);
        return Ok(());
    }

    for hit in &outcome.results {
        println!(
            "#{:<6} {}  {:<13} {:.2}  {}",
            hit.id,
            hit.created_at.format("%Y-%m-%d %H:%M"),
            hit.obs_type.as_str(),
            hit.importance.value(),
            hit.summary
                .as_deref()
                .or(hit.tool_name.as_deref())
                .unwrap_or("-")
        );
    }
    println!("\n{} result(s). Use `mnemo show <id>` for detail.", outcome.count);
    Ok(())
}
