//! Shared helper functions for CLI commands.

use std::path::Path;

use anyhow::Context;
use console::style;

use railclass::config::Config;
use railclass::error::SetupError;
use railclass::llm::LlmProvider;
use railclass::table::Table;
use railclass::taxonomy::Taxonomy;
use railclass::utils::truncate;

/// Global LLM flags, applied after the config file and environment.
#[derive(Debug, Default)]
pub struct LlmFlags {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub endpoint: Option<String>,
}

/// Load the config file (explicit path or discovery), env overrides, then flags.
pub async fn load_config(path: Option<&Path>, flags: &LlmFlags) -> anyhow::Result<Config> {
    let mut config = match path {
        Some(path) => Config::load_from_path(path)
            .await
            .with_context(|| format!("Loading {}", path.display()))?
            .with_env_overrides(),
        None => Config::load().await,
    };

    let mut switched = false;
    if let Some(ref name) = flags.provider {
        let (provider, alias_endpoint) = LlmProvider::parse(name)
            .with_context(|| format!("Unknown provider '{}'", name))?;
        switched = provider != config.llm.provider || alias_endpoint.is_some();
        if switched {
            // endpoint, model and key belong to the previous provider
            config.llm.endpoint = alias_endpoint.map(str::to_string);
            config.llm.model = None;
            config.llm.api_key = None;
        }
        config.llm.provider = provider;
    }
    if let Some(ref endpoint) = flags.endpoint {
        config.llm.endpoint = Some(endpoint.clone());
    }
    if let Some(ref model) = flags.model {
        config.llm.model = Some(model.clone());
    }
    if switched {
        config.llm = config.llm.with_env_api_key();
    }
    Ok(config)
}

/// Resolve the taxonomy from a command flag or the config.
pub fn resolve_taxonomy(flag: Option<&str>, config: &Config) -> Result<Taxonomy, SetupError> {
    let source = match flag {
        Some(name) => name.to_string(),
        None => config.taxonomy_source(),
    };
    Ok(Taxonomy::resolve(&source)?)
}

/// Print the columns of a table so the user can pick one.
pub fn print_columns(table: &Table) {
    println!("{}", style("Available columns:").cyan());
    for (i, column) in table.columns().iter().enumerate() {
        let sample = table
            .column_values(i)
            .find(|v| !v.trim().is_empty())
            .map(|v| truncate(&v, 50))
            .unwrap_or_default();
        println!("  {:<30} {}", column, style(sample).dim());
    }
}
