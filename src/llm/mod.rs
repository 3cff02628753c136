//! LLM integration: the classification oracle.
//!
//! Supports a local Ollama server, Google Gemini, and any OpenAI-compatible
//! chat completions API.

mod backend;
mod config;
mod gemini;
mod ollama;
mod openai;
pub mod rate_limit;
#[cfg(test)]
pub(crate) mod scripted;

use std::time::Duration;

use reqwest::Client;
use tracing::debug;

pub use backend::{GenerationParams, LlmBackend, LlmError};
pub use config::{LlmConfig, LlmProvider};
pub use gemini::GeminiBackend;
pub use ollama::OllamaBackend;
pub use openai::OpenAiBackend;

/// Build the backend selected by `config`.
///
/// Fails when the HTTP client cannot be created or a hosted provider has no
/// API key.
pub fn build_backend(config: &LlmConfig) -> Result<Box<dyn LlmBackend>, LlmError> {
    let client = Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()
        .map_err(|e| LlmError::Connection(format!("Failed to create HTTP client: {}", e)))?;

    debug!(
        "Using {} backend at {} (model {})",
        config.provider.display_name(),
        config.effective_endpoint(),
        config.effective_model()
    );

    let backend: Box<dyn LlmBackend> = match config.provider {
        LlmProvider::Ollama => Box::new(OllamaBackend::new(config, client)),
        LlmProvider::Gemini => Box::new(GeminiBackend::new(config, client)?),
        LlmProvider::OpenAI => Box::new(OpenAiBackend::new(config, client)?),
    };
    Ok(backend)
}
