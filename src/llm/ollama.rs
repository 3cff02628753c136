//! Ollama backend for local inference.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::backend::{GenerationParams, LlmBackend, LlmError};
use super::rate_limit::send_with_retry;
use super::LlmConfig;

/// Ollama `/api/generate` client.
pub struct OllamaBackend {
    endpoint: String,
    model: String,
    max_retries: u32,
    client: Client,
}

/// Ollama API request format.
#[derive(Debug, Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<OllamaOptions>,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_k: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

/// Ollama API response format.
#[derive(Debug, Deserialize)]
struct OllamaResponse {
    #[serde(default)]
    response: String,
}

impl OllamaBackend {
    pub fn new(config: &LlmConfig, client: Client) -> Self {
        Self {
            endpoint: config.effective_endpoint().to_string(),
            model: config.effective_model().to_string(),
            max_retries: config.max_retries,
            client,
        }
    }

    fn build_request<'a>(&'a self, prompt: &'a str, params: &GenerationParams) -> OllamaRequest<'a> {
        let options = (!params.is_empty()).then(|| OllamaOptions {
            temperature: params.temperature,
            top_p: params.top_p,
            top_k: params.top_k,
            num_predict: params.max_output_tokens,
        });
        OllamaRequest {
            model: &self.model,
            prompt,
            stream: false,
            options,
        }
    }

    /// List models installed on the server.
    pub async fn list_models(&self) -> Result<Vec<String>, LlmError> {
        #[derive(Deserialize)]
        struct TagsResponse {
            models: Vec<ModelInfo>,
        }

        #[derive(Deserialize)]
        struct ModelInfo {
            name: String,
        }

        let url = format!("{}/api/tags", self.endpoint);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| LlmError::Connection(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(LlmError::Api(format!("HTTP {}", resp.status())));
        }

        let tags: TagsResponse = resp
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;

        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }
}

#[async_trait]
impl LlmBackend for OllamaBackend {
    fn name(&self) -> &str {
        "Ollama"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn is_available(&self) -> bool {
        match self.list_models().await {
            // untagged names are served as ":latest"
            Ok(models) => models
                .iter()
                .any(|m| *m == self.model || *m == format!("{}:latest", self.model)),
            Err(_) => false,
        }
    }

    async fn invoke(&self, prompt: &str, params: &GenerationParams) -> Result<String, LlmError> {
        let request = self.build_request(prompt, params);
        let url = format!("{}/api/generate", self.endpoint);

        debug!("Ollama: generating with {}", self.model);
        let resp = send_with_retry("Ollama", self.max_retries, || {
            self.client.post(&url).json(&request)
        })
        .await?;

        let ollama_resp: OllamaResponse = resp
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;

        Ok(ollama_resp.response.trim().to_string())
    }
}
