//! `mnemo init`: write the default config and create the data directory.

use std::path::Path;

use mnemo_config::AppConfig;

pub fn run(config_path: &Path, force: bool) -> Result<(), Box<dyn std::error::Error>> {
    if write_default(config_path, force)? {
        println!("✅ Wrote {}", config_path.display());
    } else {
        println!("  Config already exists: {}", config_path.display());
        println!("  (use --force to overwrite with defaults)");
    }

    let config = super::load_config(config_path)?;
    let data_dir = config.storage.data_dir();
    if !data_dir.exists() {
        std::fs::create_dir_all(&data_dir)?;
        println!("✅ Created data directory: {}", data_dir.display());
    }

    println!("\n  Database: {}", config.storage.database_url());
    println!("  Worker:   {}", config.worker.base_url());
    println!("\n  Next: run `mnemo serve`");
    Ok(())
}

/// Returns whether the file was written.
fn write_default(config_path: &Path, force: bool) -> std::io::Result<bool> {
    if config_path.exists() && !force {
        return Ok(false);
    }
    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(config_path, AppConfig::default_toml())?;
    Ok(true)
}
