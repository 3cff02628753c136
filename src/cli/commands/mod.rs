//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod batch;
mod check;
mod classify;
mod taxonomy;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use super::helpers::{load_config, LlmFlags};

#[derive(Parser)]
#[command(name = "railclass")]
#[command(about = "Classify railway incident reports into a fixed taxonomy with an LLM")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// LLM provider: ollama, gemini, openai, groq or together
    #[arg(long, global = true)]
    provider: Option<String>,

    /// Model name (provider default when unset)
    #[arg(long, global = true)]
    model: Option<String>,

    /// API endpoint (provider default when unset)
    #[arg(long, global = true)]
    endpoint: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Classify a single text
    Classify {
        /// Text to classify (multiple words are joined with spaces)
        #[arg(required = true)]
        text: Vec<String>,
        /// Taxonomy preset name or path to a taxonomy TOML file
        #[arg(short, long)]
        taxonomy: Option<String>,
    },

    /// Classify every row of a CSV, XLSX, JSON or JSONL table
    Batch {
        /// Input table
        input: PathBuf,
        /// Column holding the text to classify
        #[arg(long)]
        column: Option<String>,
        /// Output file (default: <input>_clasificado.<ext>)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Pause between calls in milliseconds (0 disables pacing)
        #[arg(long)]
        delay_ms: Option<u64>,
        /// Consecutive failures before the batch stops
        #[arg(long)]
        threshold: Option<u32>,
        /// Do not pause after a failed call
        #[arg(long)]
        skip_delay_on_error: bool,
        /// Do not count replies without a label toward the failure streak
        #[arg(long)]
        empty_label_ok: bool,
        /// Taxonomy preset name or path to a taxonomy TOML file
        #[arg(short, long)]
        taxonomy: Option<String>,
        /// Name of the appended label column
        #[arg(long)]
        label_column: Option<String>,
        /// Name of the appended justification column
        #[arg(long)]
        justification_column: Option<String>,
    },

    /// Inspect taxonomies
    Taxonomy {
        #[command(subcommand)]
        command: TaxonomyCommands,
    },

    /// Check that the configured LLM backend is reachable
    Check,
}

#[derive(Subcommand)]
enum TaxonomyCommands {
    /// List built-in presets
    List,
    /// Show a taxonomy's categories and reply fields
    Show {
        /// Preset name or path to a taxonomy TOML file
        name: String,
    },
    /// Render the prompt a taxonomy produces
    Prompt {
        /// Preset name or path to a taxonomy TOML file
        name: String,
        /// Sample text embedded in the prompt
        #[arg(long, default_value = "<texto del reporte>")]
        text: String,
    },
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let flags = LlmFlags {
        provider: cli.provider,
        model: cli.model,
        endpoint: cli.endpoint,
    };
    let config = load_config(cli.config.as_deref(), &flags).await?;

    match cli.command {
        Commands::Classify { text, taxonomy } => {
            classify::cmd_classify(&config, &text.join(" "), taxonomy.as_deref()).await
        }
        Commands::Batch {
            input,
            column,
            output,
            delay_ms,
            threshold,
            skip_delay_on_error,
            empty_label_ok,
            taxonomy,
            label_column,
            justification_column,
        } => {
            let args = batch::BatchArgs {
                input,
                column,
                output,
                delay_ms,
                threshold,
                skip_delay_on_error,
                empty_label_ok,
                taxonomy,
                label_column,
                justification_column,
            };
            batch::cmd_batch(&config, args).await
        }
        Commands::Taxonomy { command } => match command {
            TaxonomyCommands::List => taxonomy::cmd_taxonomy_list(),
            TaxonomyCommands::Show { name } => taxonomy::cmd_taxonomy_show(&name),
            TaxonomyCommands::Prompt { name, text } => taxonomy::cmd_taxonomy_prompt(&name, &text),
        },
        Commands::Check => check::cmd_check(&config).await,
    }
}
