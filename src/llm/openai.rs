//! OpenAI-compatible chat completions backend (OpenAI, Groq, Together.ai,
//! llama.cpp server, vLLM).

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::backend::{GenerationParams, LlmBackend, LlmError};
use super::rate_limit::send_with_retry;
use super::LlmConfig;

/// Chat completions client.
pub struct OpenAiBackend {
    endpoint: String,
    model: String,
    api_key: Option<String>,
    max_retries: u32,
    client: Client,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Option<Vec<ChatChoice>>,
    error: Option<ChatError>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatError {
    message: String,
}

impl OpenAiBackend {
    /// Hosted endpoints need a key; a custom endpoint (local server) may not.
    pub fn new(config: &LlmConfig, client: Client) -> Result<Self, LlmError> {
        if config.api_key.is_none() && config.endpoint.is_none() {
            return Err(LlmError::MissingApiKey(
                "OPENAI_API_KEY (or GROQ_API_KEY / TOGETHER_API_KEY / LLM_API_KEY) not set".to_string(),
            ));
        }

        Ok(Self {
            endpoint: config.effective_endpoint().to_string(),
            model: config.effective_model().to_string(),
            api_key: config.api_key.clone(),
            max_retries: config.max_retries,
            client,
        })
    }

    fn build_request<'a>(&'a self, prompt: &'a str, params: &GenerationParams) -> ChatRequest<'a> {
        // top_k has no chat-completions equivalent
        ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: params.temperature,
            top_p: params.top_p,
            max_tokens: params.max_output_tokens,
        }
    }

    fn extract_text(response: ChatResponse) -> Result<String, LlmError> {
        if let Some(error) = response.error {
            return Err(LlmError::Api(error.message));
        }
        let choice = response
            .choices
            .and_then(|c| c.into_iter().next())
            .ok_or_else(|| LlmError::Parse("response contained no choices".to_string()))?;
        Ok(choice.message.content.unwrap_or_default().trim().to_string())
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }
}

#[async_trait]
impl LlmBackend for OpenAiBackend {
    fn name(&self) -> &str {
        "OpenAI"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn is_available(&self) -> bool {
        let url = format!("{}/v1/models", self.endpoint);
        match self.authorized(self.client.get(&url)).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }

    async fn invoke(&self, prompt: &str, params: &GenerationParams) -> Result<String, LlmError> {
        let request = self.build_request(prompt, params);
        let url = format!("{}/v1/chat/completions", self.endpoint);

        debug!("OpenAI-compatible: generating with {}", self.model);
        let resp = send_with_retry("OpenAI", self.max_retries, || {
            self.authorized(self.client.post(&url)).json(&request)
        })
        .await?;

        let chat: ChatResponse = resp
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;

        Self::extract_text(chat)
    }
}
