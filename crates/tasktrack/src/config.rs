//! Configuration file support for tasktrack.
//!
//! All tasktrack data is stored in a `.tasktrack/` directory:
//! - `.tasktrack/config.toml` - Configuration file
//! - `.tasktrack/tasks/` - Task records (active), with `done/` beneath it
//! - `.tasktrack/logs/` - Log files when `--log-file` is given
//!
//! Config discovery searches for `.tasktrack/config.toml` starting from the
//! current directory and walking up to parent directories.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tasktrack_store::{DEFAULT_LIMIT, DEFAULT_THRESHOLD, RankParams};

/// The tasktrack data directory name.
pub const TASKTRACK_DIR: &str = ".tasktrack";
/// The config file name within the tasktrack directory.
pub const CONFIG_FILE: &str = "config.toml";

/// Embedding providers the CLI knows how to build.
pub const PROVIDERS: &[&str] = &["ollama", "mock"];

/// Main configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Task storage settings.
    pub store: StoreConfig,
    /// Embedding provider settings.
    pub embedder: EmbedderConfig,
    /// Search tuning.
    pub search: SearchConfig,
}

/// Task storage configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory holding active task files.
    pub dir: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            // Relative to .tasktrack/ directory
            dir: PathBuf::from(DEFAULT_STORE_DIR),
        }
    }
}

/// Embedding provider configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EmbedderConfig {
    /// Provider: "ollama" or "mock".
    pub provider: String,
    /// Embedding model name.
    pub model: String,
    /// API base URL override.
    pub base_url: Option<String>,
    /// HTTP request timeout in seconds.
    pub timeout_secs: u64,
    /// Retries on network failures.
    pub max_retries: u32,
    /// Overall deadline for one embedding call, retries included.
    pub embed_timeout_secs: Option<u64>,
    /// Vector size for the mock provider.
    pub dimensions: usize,
}

impl Default for EmbedderConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            model: "nomic-embed-text".to_string(),
            base_url: None,
            timeout_secs: 60,
            max_retries: 3,
            embed_timeout_secs: None,
            dimensions: 64,
        }
    }
}

/// Search configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Minimum score (exclusive) for a result to be reported.
    pub threshold: f32,
    /// Maximum number of results.
    pub limit: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl Config {
    /// Load configuration from a file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Find and load configuration from current or parent directories.
    pub fn find_and_load() -> Result<Option<(Self, PathBuf)>> {
        let current = std::env::current_dir()?;
        Self::find_and_load_from(&current)
    }

    /// Find and load configuration starting from a specific directory.
    ///
    /// Returns the config together with the `.tasktrack` directory it was
    /// found in.
    pub fn find_and_load_from(start: &Path) -> Result<Option<(Self, PathBuf)>> {
        let mut dir = start.to_path_buf();

        loop {
            let tasktrack_dir = dir.join(TASKTRACK_DIR);
            let config_path = tasktrack_dir.join(CONFIG_FILE);
            if config_path.exists() {
                let config = Self::from_file(&config_path)?;
                return Ok(Some((config, tasktrack_dir)));
            }

            if !dir.pop() {
                break;
            }
        }

        Ok(None)
    }

    /// Resolve the store directory relative to the .tasktrack directory.
    pub fn resolve_store_dir(&self, tasktrack_dir: Option<&Path>) -> PathBuf {
        if self.store.dir.is_absolute() {
            self.store.dir.clone()
        } else if let Some(dir) = tasktrack_dir {
            dir.join(&self.store.dir)
        } else {
            PathBuf::from(TASKTRACK_DIR).join(&self.store.dir)
        }
    }

    /// Ranking parameters from the `[search]` section.
    pub fn rank_params(&self) -> RankParams {
        RankParams::default()
            .with_threshold(self.search.threshold)
            .with_limit(self.search.limit)
    }

    /// Deadline for a single embedding call, if configured.
    pub fn embed_timeout(&self) -> Option<Duration> {
        self.embedder.embed_timeout_secs.map(Duration::from_secs)
    }

    /// Validate the configuration.
    ///
    /// Returns a list of validation errors if any are found.
    pub fn validate(&self) -> Vec<ConfigValidationError> {
        let mut errors = Vec::new();

        if !PROVIDERS.contains(&self.embedder.provider.as_str()) {
            errors.push(ConfigValidationError {
                field: "embedder.provider".to_string(),
                message: format!(
                    "Invalid provider '{}'. Expected one of: {}.",
                    self.embedder.provider,
                    PROVIDERS.join(", ")
                ),
            });
        }

        if self.embedder.provider == "ollama" && self.embedder.model.is_empty() {
            errors.push(ConfigValidationError {
                field: "embedder.model".to_string(),
                message: "Embedding model cannot be empty.".to_string(),
            });
        }

        if self.embedder.timeout_secs == 0 {
            errors.push(ConfigValidationError {
                field: "embedder.timeout_secs".to_string(),
                message: "Timeout must be at least one second.".to_string(),
            });
        }

        if self.embedder.provider == "mock" && self.embedder.dimensions == 0 {
            errors.push(ConfigValidationError {
                field: "embedder.dimensions".to_string(),
                message: "Mock embedder needs at least one dimension.".to_string(),
            });
        }

        if !(0.0..1.0).contains(&self.search.threshold) {
            errors.push(ConfigValidationError {
                field: "search.threshold".to_string(),
                message: format!(
                    "Threshold {} is out of range. Expected 0.0 <= threshold < 1.0.",
                    self.search.threshold
                ),
            });
        }

        if self.search.limit == 0 {
            errors.push(ConfigValidationError {
                field: "search.limit".to_string(),
                message: "Search limit must be positive.".to_string(),
            });
        }

        errors
    }
}

/// Configuration validation error.
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ConfigValidationError {}

/// Store directory written by `tasktrack init` when none is given.
pub const DEFAULT_STORE_DIR: &str = "tasks";

/// Contents written by `tasktrack init`, pointing the store at `store_dir`.
pub fn default_config_toml(store_dir: &Path) -> String {
    let dir = toml::Value::String(store_dir.display().to_string());
    format!(
        r#"# tasktrack configuration
# All paths are relative to this .tasktrack/ directory unless absolute

[store]
dir = {dir}  # Active tasks; finished ones live in done/ beneath it

[embedder]
provider = "ollama"  # Options: "ollama", "mock"
model = "nomic-embed-text"
# base_url = "http://localhost:11434"  # Or use TASKTRACK_OLLAMA_URL env var
timeout_secs = 60
max_retries = 3

[search]
threshold = 0.01  # Results must score above this
limit = 10
"#
    )
}
