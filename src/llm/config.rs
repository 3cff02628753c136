//! LLM backend configuration.

use serde::{Deserialize, Serialize};

use super::backend::GenerationParams;

const OLLAMA_ENDPOINT: &str = "http://localhost:11434";
const GEMINI_ENDPOINT: &str = "https://generativelanguage.googleapis.com";
const OPENAI_ENDPOINT: &str = "https://api.openai.com";
const GROQ_ENDPOINT: &str = "https://api.groq.com/openai";
const TOGETHER_ENDPOINT: &str = "https://api.together.xyz";

/// LLM provider type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    /// Ollama API (local, default)
    #[default]
    Ollama,
    /// Google Gemini generateContent API
    Gemini,
    /// OpenAI-compatible API (OpenAI, Groq, Together.ai, etc.)
    #[serde(alias = "groq", alias = "together")]
    OpenAI,
}

impl LlmProvider {
    /// Parse a provider name, returning the provider and, for aliases of
    /// OpenAI-compatible hosts, the endpoint that name implies.
    pub fn parse(s: &str) -> Option<(Self, Option<&'static str>)> {
        match s.trim().to_lowercase().as_str() {
            "ollama" => Some((Self::Ollama, None)),
            "gemini" | "google" => Some((Self::Gemini, None)),
            "openai" => Some((Self::OpenAI, None)),
            "groq" => Some((Self::OpenAI, Some(GROQ_ENDPOINT))),
            "together" => Some((Self::OpenAI, Some(TOGETHER_ENDPOINT))),
            _ => None,
        }
    }

    /// Display name, also used as the suffix of the output columns.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Ollama => "Ollama",
            Self::Gemini => "Gemini",
            Self::OpenAI => "OpenAI",
        }
    }

    fn default_endpoint(&self) -> &'static str {
        match self {
            Self::Ollama => OLLAMA_ENDPOINT,
            Self::Gemini => GEMINI_ENDPOINT,
            Self::OpenAI => OPENAI_ENDPOINT,
        }
    }

    fn default_model(&self) -> &'static str {
        match self {
            Self::Ollama => "deepseek-r1:14b",
            Self::Gemini => "gemini-2.5-flash",
            Self::OpenAI => "gpt-4o-mini",
        }
    }
}

/// Configuration for the LLM backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmConfig {
    /// LLM provider (ollama, gemini or openai)
    #[serde(default)]
    pub provider: LlmProvider,
    /// API endpoint (provider-specific default when unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// API key for hosted providers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Model name (provider-specific default when unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Sampling parameters (provider defaults when unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation: Option<GenerationParams>,
    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Retries on HTTP 429 before the call counts as failed
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Maximum characters of report text embedded in the prompt
    #[serde(default = "default_max_content_chars")]
    pub max_content_chars: usize,
}

fn default_timeout_secs() -> u64 {
    300
}

fn default_max_retries() -> u32 {
    3
}

fn default_max_content_chars() -> usize {
    12000
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::default(),
            endpoint: None,
            api_key: None,
            model: None,
            generation: None,
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            max_content_chars: default_max_content_chars(),
        }
    }
}

impl LlmConfig {
    /// Endpoint to use, falling back to the provider default.
    pub fn effective_endpoint(&self) -> &str {
        self.endpoint
            .as_deref()
            .unwrap_or_else(|| self.provider.default_endpoint())
            .trim_end_matches('/')
    }

    /// Model to use, falling back to the provider default.
    pub fn effective_model(&self) -> &str {
        self.model
            .as_deref()
            .unwrap_or_else(|| self.provider.default_model())
    }

    /// Sampling parameters to send. Gemini gets the deterministic defaults,
    /// other providers keep the server's own.
    pub fn effective_generation(&self) -> GenerationParams {
        match (self.generation, self.provider) {
            (Some(params), _) => params,
            (None, LlmProvider::Gemini) => GenerationParams::gemini_defaults(),
            (None, _) => GenerationParams::default(),
        }
    }

    /// Apply environment variable overrides.
    ///
    /// Supported env vars:
    /// - `LLM_PROVIDER`: "ollama" (default), "gemini", "openai", "groq", or "together"
    /// - `LLM_ENDPOINT`: API endpoint (defaults based on provider)
    /// - `LLM_API_KEY`: API key for any hosted provider
    /// - `GEMINI_API_KEY` / `OPENAI_API_KEY` / `GROQ_API_KEY` / `TOGETHER_API_KEY`:
    ///   provider-specific keys
    /// - `LLM_MODEL`: Model name
    /// - `LLM_TEMPERATURE`, `LLM_TOP_P`, `LLM_TOP_K`, `LLM_MAX_TOKENS`: sampling
    /// - `LLM_TIMEOUT_SECS`: Request timeout
    /// - `LLM_MAX_CONTENT_CHARS`: Max report chars to send
    ///
    /// `LLM_API_KEY` wins over provider-specific keys.
    pub fn with_env_overrides(self) -> Self {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup (env in production, a map in tests).
    pub fn apply_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let explicit_endpoint = lookup("LLM_ENDPOINT").filter(|s| !s.is_empty());

        if let Some(val) = lookup("LLM_PROVIDER") {
            if let Some((provider, alias_endpoint)) = LlmProvider::parse(&val) {
                self.provider = provider;
                if explicit_endpoint.is_none() {
                    if let Some(endpoint) = alias_endpoint {
                        self.endpoint = Some(endpoint.to_string());
                    }
                }
            }
        }

        if let Some(endpoint) = explicit_endpoint {
            self.endpoint = Some(endpoint);
        }

        self.apply_api_key(&lookup);

        if let Some(val) = lookup("LLM_MODEL").filter(|s| !s.is_empty()) {
            self.model = Some(val);
        }

        let mut generation = self.effective_generation();
        let mut touched = false;
        if let Some(t) = lookup("LLM_TEMPERATURE").and_then(|v| v.parse().ok()) {
            generation.temperature = Some(t);
            touched = true;
        }
        if let Some(p) = lookup("LLM_TOP_P").and_then(|v| v.parse().ok()) {
            generation.top_p = Some(p);
            touched = true;
        }
        if let Some(k) = lookup("LLM_TOP_K").and_then(|v| v.parse().ok()) {
            generation.top_k = Some(k);
            touched = true;
        }
        if let Some(n) = lookup("LLM_MAX_TOKENS").and_then(|v| v.parse().ok()) {
            generation.max_output_tokens = Some(n);
            touched = true;
        }
        if touched {
            self.generation = Some(generation);
        }

        if let Some(n) = lookup("LLM_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            self.timeout_secs = n;
        }
        if let Some(n) = lookup("LLM_MAX_CONTENT_CHARS").and_then(|v| v.parse().ok()) {
            self.max_content_chars = n;
        }
        self
    }

    /// Fill in the API key from the environment for the current provider.
    /// Used after the provider changes on the command line.
    pub fn with_env_api_key(mut self) -> Self {
        self.apply_api_key(&|key: &str| std::env::var(key).ok());
        self
    }

    fn apply_api_key<F>(&mut self, lookup: &F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("LLM_API_KEY").filter(|s| !s.is_empty()) {
            self.api_key = Some(key);
        } else if self.api_key.is_none() {
            self.api_key = match self.provider {
                LlmProvider::Gemini => lookup("GEMINI_API_KEY"),
                LlmProvider::OpenAI => match self.effective_endpoint() {
                    GROQ_ENDPOINT => lookup("GROQ_API_KEY"),
                    TOGETHER_ENDPOINT => lookup("TOGETHER_API_KEY"),
                    _ => lookup("OPENAI_API_KEY"),
                },
                LlmProvider::Ollama => None,
            }
            .filter(|s| !s.is_empty());
        }
    }

    pub fn with_provider(mut self, provider: LlmProvider) -> Self {
        self.provider = provider;
        self
    }

    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = Some(endpoint.to_string());
        self
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = Some(model.to_string());
        self
    }
}
