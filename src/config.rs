//! Configuration management using the prefer crate for discovery.
//!
//! Precedence, lowest first: built-in defaults, the config file (discovered as
//! `railclass.{toml,yaml,json}` or given with `--config`), environment
//! variables, then command-line flags applied by the CLI.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::batch::{BatchOptions, FailureDelay, OutputColumns};
use crate::llm::LlmConfig;
use crate::taxonomy::DEFAULT_TAXONOMY;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {format} config: {message}")]
    Parse {
        format: &'static str,
        message: String,
    },
}

/// Pacing and circuit-breaker settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Pause between calls in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_threshold: Option<u32>,
    /// "always" or "skip"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_delay: Option<FailureDelay>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub empty_label_is_failure: Option<bool>,
}

impl BatchConfig {
    pub fn to_options(&self) -> BatchOptions {
        let defaults = BatchOptions::default();
        BatchOptions {
            delay: self
                .delay_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.delay),
            failure_threshold: self.failure_threshold.unwrap_or(defaults.failure_threshold),
            failure_delay: self.failure_delay.unwrap_or(defaults.failure_delay),
            empty_label_is_failure: self
                .empty_label_is_failure
                .unwrap_or(defaults.empty_label_is_failure),
        }
    }
}

/// Names of the appended output columns. Unset names derive from the backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_column: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub justification_column: Option<String>,
}

impl OutputConfig {
    pub fn columns_for(&self, backend: &str) -> OutputColumns {
        let derived = OutputColumns::for_backend(backend);
        OutputColumns {
            label: self.label_column.clone().unwrap_or(derived.label),
            justification: self
                .justification_column
                .clone()
                .unwrap_or(derived.justification),
        }
    }
}

/// Configuration file structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Preset name or path to a taxonomy TOML file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub taxonomy: Option<String>,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default)]
    pub output: OutputConfig,
    /// Path to the config file this was loaded from (not serialized).
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Discover and load the config file, falling back to defaults.
    /// Environment overrides are applied either way.
    pub async fn load() -> Self {
        let config = match prefer::load("railclass").await {
            Ok(pref_config) => match pref_config.source_path() {
                Some(path) => match Self::load_from_path(path).await {
                    Ok(config) => config,
                    Err(e) => {
                        warn!("Ignoring config file: {}", e);
                        Self::default()
                    }
                },
                None => Self::default(),
            },
            Err(_) => Self::default(),
        };
        config.with_env_overrides()
    }

    /// Load configuration from a specific file path.
    /// The format follows the extension: TOML, YAML, or JSON otherwise.
    pub async fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.display().to_string(),
                source,
            })?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");
        let mut config = Self::parse(&contents, ext)?;
        config.source_path = Some(path.to_path_buf());
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    fn parse(contents: &str, ext: &str) -> Result<Self, ConfigError> {
        match ext {
            "toml" => toml::from_str(contents).map_err(|e| ConfigError::Parse {
                format: "TOML",
                message: e.to_string(),
            }),
            "yaml" | "yml" => serde_yaml::from_str(contents).map_err(|e| ConfigError::Parse {
                format: "YAML",
                message: e.to_string(),
            }),
            _ => serde_json::from_str(contents).map_err(|e| ConfigError::Parse {
                format: "JSON",
                message: e.to_string(),
            }),
        }
    }

    pub fn with_env_overrides(self) -> Self {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Supported env vars beyond the `LLM_*` set:
    /// - `RAILCLASS_DELAY_MS`: pause between calls
    /// - `RAILCLASS_FAILURE_THRESHOLD`: consecutive failures before stopping
    /// - `RAILCLASS_TAXONOMY`: preset name or taxonomy file
    pub fn apply_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(ms) = lookup("RAILCLASS_DELAY_MS").and_then(|v| v.parse().ok()) {
            self.batch.delay_ms = Some(ms);
        }
        if let Some(n) = lookup("RAILCLASS_FAILURE_THRESHOLD").and_then(|v| v.parse().ok()) {
            self.batch.failure_threshold = Some(n);
        }
        if let Some(name) = lookup("RAILCLASS_TAXONOMY").filter(|s| !s.trim().is_empty()) {
            self.taxonomy = Some(name);
        }
        self.llm = self.llm.apply_overrides(&lookup);
        self
    }

    /// Directory of the loaded config file, if any.
    pub fn base_dir(&self) -> Option<&Path> {
        self.source_path.as_deref().and_then(Path::parent)
    }

    /// Taxonomy to resolve. A relative `.toml` path from the config file is
    /// taken relative to that file.
    pub fn taxonomy_source(&self) -> String {
        let Some(taxonomy) = self.taxonomy.as_deref() else {
            return DEFAULT_TAXONOMY.to_string();
        };
        let path = Path::new(taxonomy);
        match self.base_dir() {
            Some(base) if path.extension().is_some_and(|e| e == "toml") && path.is_relative() => {
                base.join(path).display().to_string()
            }
            _ => taxonomy.to_string(),
        }
    }
}
