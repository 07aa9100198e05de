//! mnemo CLI: the main entry point.
//!
//! Commands:
//! - `init`     : Write the default config and create the data directory
//! - `serve`    : Run the memory worker
//! - `status`   : Show config and worker status
//! - `search`   : Ranked search over recorded observations
//! - `context`  : Print the context a new session would receive
//! - `timeline` : Observations recorded around one observation
//! - `show`     : Full detail for observations by id

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use mnemo_core::observation::ObservationType;

mod commands;

#[derive(Parser, Debug)]
#[command(
    name = "mnemo",
    about = "mnemo: persistent observation memory for coding agents",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use this config file instead of ~/.mnemo/config.toml
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write the default config and create the data directory
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },

    /// Run the memory worker
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Show config and worker status
    Status,

    /// Ranked search over recorded observations
    Search {
        /// Full-text query
        query: String,

        /// Only observations of this type
        #[arg(short = 't', long = "type")]
        obs_type: Option<ObservationType>,

        /// Maximum number of results
        #[arg(short, long, default_value_t = 10)]
        limit: usize,

        /// Only observations from sessions in this project
        #[arg(short, long)]
        project: Option<String>,
    },

    /// Print the context a new session would receive
    Context {
        /// Scope to one project
        #[arg(short, long)]
        project: Option<String>,

        /// Token ceiling (defaults to the configured value)
        #[arg(short, long)]
        max_tokens: Option<usize>,
    },

    /// Observations recorded around one observation
    Timeline {
        /// Center observation id
        id: i64,

        /// Half-width of the window in hours
        #[arg(long, default_value_t = 2.0)]
        hours: f64,
    },

    /// Full detail for observations by id
    Show {
        #[arg(required = true, num_args = 1..)]
        ids: Vec<i64>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli.config.unwrap_or_else(mnemo_config::AppConfig::config_path);

    match cli.command {
        Commands::Init { force } => commands::init::run(&config_path, force)?,
        Commands::Serve { port } => commands::serve::run(&config_path, port).await?,
        Commands::Status => commands::status::run(&config_path).await?,
        Commands::Search {
            query,
            obs_type,
            limit,
            project,
        } => commands::search::run(&config_path, query, obs_type, limit, project).await?,
        Commands::Context {
            project,
            max_tokens,
        } => commands::context::run(&config_path, project, max_tokens).await?,
        Commands::Timeline { id, hours } => commands::timeline::run(&config_path, id, hours).await?,
        Commands::Show { ids } => commands::show::run(&config_path, ids).await?,
    }

    Ok(())
}
