//! Google Gemini backend.
//!
//! Uses the `generateContent` endpoint of the Generative Language API.
//! Requires `GEMINI_API_KEY` (or `LLM_API_KEY`). The key travels in the
//! `x-goog-api-key` header so it never appears in a request URL.
//!
//! Free tier quotas are low; 429 responses are retried with backoff and the
//! batch delay should be set accordingly.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::backend::{GenerationParams, LlmBackend, LlmError};
use super::rate_limit::send_with_retry;
use super::LlmConfig;

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Gemini `generateContent` client.
pub struct GeminiBackend {
    endpoint: String,
    model: String,
    api_key: String,
    max_retries: u32,
    client: Client,
}

#[derive(Debug, Serialize)]
struct GeminiRequest<'a> {
    contents: Vec<GeminiContent<'a>>,
    #[serde(rename = "generationConfig", skip_serializing_if = "Option::is_none")]
    generation_config: Option<GeminiGenerationConfig>,
}

#[derive(Debug, Serialize)]
struct GeminiContent<'a> {
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Debug, Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_k: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
    error: Option<GeminiError>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiResponseContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    message: String,
}

impl GeminiBackend {
    pub fn new(config: &LlmConfig, client: Client) -> Result<Self, LlmError> {
        let api_key = config.api_key.clone().ok_or_else(|| {
            LlmError::MissingApiKey(
                "GEMINI_API_KEY not set. Get an API key from https://ai.google.dev/".to_string(),
            )
        })?;

        Ok(Self {
            endpoint: config.effective_endpoint().to_string(),
            model: config.effective_model().to_string(),
            api_key,
            max_retries: config.max_retries,
            client,
        })
    }

    /// Authenticated request to a Gemini URL.
    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.header(API_KEY_HEADER, &self.api_key)
    }

    fn build_request<'a>(prompt: &'a str, params: &GenerationParams) -> GeminiRequest<'a> {
        let generation_config = (!params.is_empty()).then(|| GeminiGenerationConfig {
            temperature: params.temperature,
            top_p: params.top_p,
            top_k: params.top_k,
            max_output_tokens: params.max_output_tokens,
        });
        GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart { text: prompt }],
            }],
            generation_config,
        }
    }

    /// Pull the generated text out of a decoded response.
    fn extract_text(response: GeminiResponse) -> Result<String, LlmError> {
        if let Some(error) = response.error {
            return Err(LlmError::Api(format!("Gemini API error: {}", error.message)));
        }

        let candidate = response
            .candidates
            .and_then(|c| c.into_iter().next())
            .ok_or_else(|| LlmError::Parse("Gemini response contained no candidates".to_string()))?;

        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        Ok(text.trim().to_string())
    }
}

#[async_trait]
impl LlmBackend for GeminiBackend {
    fn name(&self) -> &str {
        "Gemini"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn is_available(&self) -> bool {
        let url = format!("{}/v1beta/models/{}", self.endpoint, self.model);
        match self.authed(self.client.get(&url)).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }

    async fn invoke(&self, prompt: &str, params: &GenerationParams) -> Result<String, LlmError> {
        let request = Self::build_request(prompt, params);
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.endpoint, self.model
        );

        debug!("Gemini: generating with {}", self.model);
        let resp = send_with_retry("Gemini", self.max_retries, || {
            self.authed(self.client.post(&url)).json(&request)
        })
        .await?;

        let gemini_response: GeminiResponse = resp
            .json()
            .await
            .map_err(|e| LlmError::Parse(format!("Failed to parse response: {}", e.without_url())))?;

        Self::extract_text(gemini_response)
    }
}
