//! Configuration loading, validation, and management for mnemo.
//!
//! Loads configuration from `~/.mnemo/config.toml`. Every value is
//! explicit: the worker port and storage location come from this file
//! (or a CLI flag), never from ad-hoc environment lookups.

use mnemo_core::observation::{Importance, ObservationType};
use mnemo_core::store::{ContextFilter, MAX_CONTEXT_CANDIDATES};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.mnemo/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Worker (HTTP) configuration
    #[serde(default)]
    pub worker: WorkerConfig,

    /// Storage location
    #[serde(default)]
    pub storage: StorageConfig,

    /// Context injection defaults
    #[serde(default)]
    pub context: ContextConfig,

    /// Ingestion limits
    #[serde(default)]
    pub ingest: IngestConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Client-side timeout for calls into the worker.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    37777
}
fn default_request_timeout_ms() -> u64 {
    2000
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl WorkerConfig {
    /// Base URL clients use to reach the worker.
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    /// Socket address the worker binds.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Data directory. Defaults to `~/.mnemo`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,

    /// Database file, relative to `data_dir` unless absolute.
    /// `":memory:"` keeps everything in-process.
    #[serde(default = "default_database")]
    pub database: String,
}

fn default_database() -> String {
    "mnemo.sqlite".into()
}

impl StorageConfig {
    /// The effective data directory, with a leading `~` expanded.
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir
            .as_deref()
            .map(expand_tilde)
            .unwrap_or_else(AppConfig::config_dir)
    }

    /// The SQLite location handed to the store: a file path or `sqlite::memory:`.
    pub fn database_url(&self) -> String {
        if self.database == ":memory:" {
            return "sqlite::memory:".into();
        }
        let path = expand_tilde(Path::new(&self.database));
        let full = if path.is_absolute() {
            path
        } else {
            self.data_dir().join(path)
        };
        format!("sqlite://{}", full.display())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,

    #[serde(default = "ObservationType::default_injected")]
    pub include_types: Vec<ObservationType>,

    #[serde(default = "default_min_importance")]
    pub min_importance: f64,

    #[serde(default = "default_candidate_limit")]
    pub candidate_limit: usize,
}

fn default_true() -> bool {
    true
}
fn default_max_tokens() -> usize {
    mnemo_core::budget::DEFAULT_MAX_TOKENS
}
fn default_min_importance() -> f64 {
    0.5
}
fn default_candidate_limit() -> usize {
    MAX_CONTEXT_CANDIDATES
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_tokens: default_max_tokens(),
            include_types: ObservationType::default_injected(),
            min_importance: default_min_importance(),
            candidate_limit: default_candidate_limit(),
        }
    }
}

impl ContextConfig {
    /// The candidate filter for an optional project scope.
    pub fn filter(&self, project_path: Option<String>) -> ContextFilter {
        ContextFilter {
            include_types: self.include_types.clone(),
            min_importance: Importance::new(self.min_importance),
            project_path,
            limit: self.candidate_limit.min(MAX_CONTEXT_CANDIDATES),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Upper bound on stored input/output length, in characters.
    #[serde(default = "default_max_field_chars")]
    pub max_field_chars: usize,
}

fn default_max_field_chars() -> usize {
    10_000
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_field_chars: default_max_field_chars(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.mnemo/config.toml).
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Write this configuration to `path`, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let write_err = |e: std::io::Error| ConfigError::WriteError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::WriteError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        std::fs::write(path, content).map_err(write_err)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".mnemo")
    }

    /// Get the default configuration file path.
    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.worker.port == 0 {
            return Err(ConfigError::ValidationError(
                "worker.port must be non-zero".into(),
            ));
        }

        if self.worker.request_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "worker.request_timeout_ms must be > 0".into(),
            ));
        }

        if self.context.max_tokens == 0 {
            return Err(ConfigError::ValidationError(
                "context.max_tokens must be > 0".into(),
            ));
        }

        if !(0.0..=1.0).contains(&self.context.min_importance) {
            return Err(ConfigError::ValidationError(
                "context.min_importance must be between 0.0 and 1.0".into(),
            ));
        }

        if self.context.candidate_limit == 0 || self.context.candidate_limit > MAX_CONTEXT_CANDIDATES
        {
            return Err(ConfigError::ValidationError(format!(
                "context.candidate_limit must be between 1 and {MAX_CONTEXT_CANDIDATES}"
            )));
        }

        if self.ingest.max_field_chars == 0 {
            return Err(ConfigError::ValidationError(
                "ingest.max_field_chars must be > 0".into(),
            ));
        }

        Ok(())
    }

    /// Generate a default config TOML string (for `init` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Expand `~` or a leading `~/` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) if rest.as_os_str().is_empty() => dirs_home(),
        Ok(rest) => dirs_home().join(rest),
        Err(_) => path.to_path_buf(),
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Failed to write config file at {path}: {reason}")]
    WriteError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.worker.port, 37777);
        assert_eq!(config.context.max_tokens, 4000);
        assert!(config.context.enabled);
        assert_eq!(
            config.context.include_types,
            vec![
                ObservationType::Decision,
                ObservationType::Bugfix,
                ObservationType::Architecture
            ]
        );
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.worker.port, config.worker.port);
        assert_eq!(parsed.context.include_types, config.context.include_types);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let toml_str = r#"
[worker]
port = 4100

[context]
max_tokens = 1500
include_types = ["bugfix", "testing"]
"#;
        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.worker.port, 4100);
        assert_eq!(config.worker.host, "127.0.0.1");
        assert_eq!(config.context.max_tokens, 1500);
        assert_eq!(
            config.context.include_types,
            vec![ObservationType::Bugfix, ObservationType::Testing]
        );
        assert_eq!(config.context.candidate_limit, 100);
        assert_eq!(config.ingest.max_field_chars, 10_000);
    }

    #[test]
    fn unknown_include_type_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[context]\ninclude_types = [\"gossip\"]\n").unwrap();
        assert!(matches!(
            AppConfig::load_from(&path),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn invalid_values_rejected() {
        let mut config = AppConfig::default();
        config.context.min_importance = 1.5;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.context.candidate_limit = 500;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.worker.port = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.context.max_tokens = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let result = AppConfig::load_from(Path::new("/nonexistent/config.toml"));
        assert!(result.is_ok());
        assert_eq!(result.unwrap().worker.port, 37777);
    }

    #[test]
    fn save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = AppConfig::default();
        config.worker.port = 4242;
        config.save_to(&path).unwrap();

        let loaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(loaded.worker.port, 4242);
    }

    #[test]
    fn database_url_resolution() {
        let storage = StorageConfig {
            data_dir: Some(PathBuf::from("/var/lib/mnemo")),
            database: "obs.sqlite".into(),
        };
        assert_eq!(storage.database_url(), "sqlite:///var/lib/mnemo/obs.sqlite");

        let storage = StorageConfig {
            data_dir: None,
            database: ":memory:".into(),
        };
        assert_eq!(storage.database_url(), "sqlite::memory:");

        let storage = StorageConfig {
            data_dir: Some(PathBuf::from("/ignored")),
            database: "/abs/db.sqlite".into(),
        };
        assert_eq!(storage.database_url(), "sqlite:///abs/db.sqlite");
    }

    #[test]
    fn tilde_expands_to_home() {
        let config: AppConfig = toml::from_str("[storage]\ndata_dir = \"~/.mnemo\"\n").unwrap();
        let home = dirs_home();
        assert_eq!(config.storage.data_dir(), home.join(".mnemo"));
        assert_eq!(
            config.storage.database_url(),
            format!("sqlite://{}", home.join(".mnemo").join("mnemo.sqlite").display())
        );

        assert_eq!(expand_tilde(Path::new("~")), home);
        assert_eq!(expand_tilde(Path::new("~other/x")), PathBuf::from("~other/x"));
        assert_eq!(expand_tilde(Path::new("/srv/mnemo")), PathBuf::from("/srv/mnemo"));

        let storage = StorageConfig {
            data_dir: Some(PathBuf::from("/ignored")),
            database: "~/db/obs.sqlite".into(),
        };
        assert_eq!(
            storage.database_url(),
            format!("sqlite://{}", home.join("db").join("obs.sqlite").display())
        );
    }

    #[test]
    fn context_filter_from_config() {
        let mut context = ContextConfig::default();
        context.min_importance = 0.7;
        let filter = context.filter(Some("/work/app".into()));
        assert_eq!(filter.min_importance.value(), 0.7);
        assert_eq!(filter.project_path.as_deref(), Some("/work/app"));
        assert_eq!(filter.limit, 100);
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("37777"));
        assert!(toml_str.contains("bugfix"));
    }
}
