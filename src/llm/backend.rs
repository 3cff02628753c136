//! Backend abstraction for text-generation services.
//!
//! The classifier only needs one capability from a model: take a prompt,
//! return the generated text. Each provider adapter implements [`LlmBackend`]
//! so the classification client can drive any of them identically.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while invoking an LLM backend.
#[derive(Debug, Error)]
pub enum LlmError {
    /// Failed to connect to the LLM service (network, DNS, timeout)
    #[error("Connection error: {0}")]
    Connection(String),

    /// API returned a non-success status or an error payload
    #[error("API error: {0}")]
    Api(String),

    /// Failed to decode the response body
    #[error("Parse error: {0}")]
    Parse(String),

    /// Still rate limited after exhausting retries
    #[error("Rate limited by {backend} after {attempts} attempts")]
    RateLimited { backend: String, attempts: u32 },

    /// Provider requires an API key and none was configured
    #[error("Missing API key: {0}")]
    MissingApiKey(String),
}

/// Optional sampling parameters forwarded to the backend.
///
/// Every field is optional: unset values are omitted from the request and the
/// backend's own defaults apply.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
}

impl GenerationParams {
    /// Deterministic settings used by the hosted Gemini classifier.
    pub fn gemini_defaults() -> Self {
        Self {
            temperature: Some(0.2),
            top_p: Some(1.0),
            top_k: Some(1),
            max_output_tokens: Some(256),
        }
    }

    /// True when no parameter is set.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// A text-generation backend.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Provider name for logs and output column suffixes (e.g. "Gemini").
    fn name(&self) -> &str;

    /// Model identifier sent to the provider.
    fn model(&self) -> &str;

    /// Whether the service is reachable and configured.
    async fn is_available(&self) -> bool;

    /// Send one prompt and return the raw generated text.
    async fn invoke(&self, prompt: &str, params: &GenerationParams) -> Result<String, LlmError>;
}
