//! Single-text classification.
//!
//! [`ClassificationClient`] turns one text into a prompt, calls the backend
//! once, and parses the reply. It never returns an error: backend failures
//! become a [`ClassificationResult`] with `status == Failed` so the batch loop
//! can count them.

mod parse;
mod prompt;

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::llm::{build_backend, GenerationParams, LlmBackend, LlmConfig, LlmError};
use crate::taxonomy::Taxonomy;
use crate::utils::{truncate, truncate_chars};

pub use parse::{parse_reply, ParsedReply};
pub use prompt::build_prompt;

/// Label written for rows whose backend call failed.
pub const ERROR_LABEL: &str = "ERROR";

/// Diagnostic used when a backend error renders to an empty string.
const EMPTY_DIAGNOSTIC: &str = "Error sin mensaje";

const DEFAULT_MAX_CONTENT_CHARS: usize = 12_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassificationStatus {
    Ok,
    Failed,
}

/// Outcome for one text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassificationResult {
    pub label: String,
    pub justification: String,
    pub status: ClassificationStatus,
}

impl ClassificationResult {
    pub fn ok(label: impl Into<String>, justification: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            justification: justification.into(),
            status: ClassificationStatus::Ok,
        }
    }

    /// Hard failure carrying a diagnostic in the justification.
    pub fn failed(diagnostic: impl Into<String>) -> Self {
        let diagnostic = diagnostic.into();
        let justification = if diagnostic.trim().is_empty() {
            EMPTY_DIAGNOSTIC.to_string()
        } else {
            diagnostic
        };
        Self {
            label: ERROR_LABEL.to_string(),
            justification,
            status: ClassificationStatus::Failed,
        }
    }

    pub fn is_failed(&self) -> bool {
        self.status == ClassificationStatus::Failed
    }

    /// Ok, but the reply carried no label line.
    pub fn is_empty_label(&self) -> bool {
        !self.is_failed() && self.label.trim().is_empty()
    }

    /// Whether the label is one of the taxonomy's reserved outputs.
    pub fn is_reserved(&self, taxonomy: &Taxonomy) -> bool {
        !self.is_failed() && taxonomy.is_reserved(&self.label)
    }
}

/// Prompt-templated classifier over an [`LlmBackend`].
pub struct ClassificationClient {
    backend: Arc<dyn LlmBackend>,
    params: GenerationParams,
    max_content_chars: usize,
}

impl ClassificationClient {
    pub fn new(backend: Arc<dyn LlmBackend>) -> Self {
        Self {
            backend,
            params: GenerationParams::default(),
            max_content_chars: DEFAULT_MAX_CONTENT_CHARS,
        }
    }

    /// Build the configured backend and carry over its generation settings.
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let backend: Arc<dyn LlmBackend> = Arc::from(build_backend(config)?);
        Ok(Self::new(backend)
            .with_params(config.effective_generation())
            .with_max_content_chars(config.max_content_chars))
    }

    pub fn with_params(mut self, params: GenerationParams) -> Self {
        self.params = params;
        self
    }

    pub fn with_max_content_chars(mut self, max: usize) -> Self {
        self.max_content_chars = max;
        self
    }

    pub fn backend(&self) -> &dyn LlmBackend {
        self.backend.as_ref()
    }

    pub async fn is_available(&self) -> bool {
        self.backend.is_available().await
    }

    /// Classify one text. Empty text still issues a call.
    pub async fn classify(&self, text: &str, taxonomy: &Taxonomy) -> ClassificationResult {
        let content = truncate_chars(text, self.max_content_chars);
        if content.len() < text.len() {
            debug!(
                "Truncated input to {} characters",
                self.max_content_chars
            );
        }

        let prompt = build_prompt(taxonomy, content);
        match self.backend.invoke(&prompt, &self.params).await {
            Ok(reply) => {
                let parsed = parse_reply(&reply, &taxonomy.fields);
                if parsed.label.is_empty() {
                    debug!("Reply had no label line: {}", truncate(&reply, 200));
                }
                ClassificationResult::ok(parsed.label, parsed.justification)
            }
            Err(e) => {
                warn!("{} classification failed: {}", self.backend.name(), e);
                ClassificationResult::failed(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::scripted::{Scripted, ScriptedBackend};

    fn client_with(backend: &Arc<ScriptedBackend>) -> ClassificationClient {
        ClassificationClient::new(backend.clone())
    }

    #[tokio::test]
    async fn test_classify_parses_reply() {
        let backend = Arc::new(ScriptedBackend::always(
            "Tipo de Incidente: BARRERA ROTA\nRazón: Brazo descendente roto en PAN.",
        ));
        let taxonomy = Taxonomy::preset("ferroviario").unwrap();
        let result = client_with(&backend)
            .classify("COND. X INFORMA BRAZO DESCENDENTE ROTO", &taxonomy)
            .await;

        assert_eq!(
            result,
            ClassificationResult::ok("BARRERA ROTA", "Brazo descendente roto en PAN.")
        );
        assert_eq!(backend.calls(), 1);
        assert!(backend.prompts()[0].contains("Texto: COND. X INFORMA BRAZO DESCENDENTE ROTO"));
    }

    #[tokio::test]
    async fn test_backend_failure_becomes_error_result() {
        let backend = Arc::new(ScriptedBackend::failing("HTTP 503: overloaded"));
        let taxonomy = Taxonomy::preset("incidentes-leves").unwrap();
        let result = client_with(&backend).classify("texto", &taxonomy).await;

        assert!(result.is_failed());
        assert_eq!(result.label, ERROR_LABEL);
        assert!(result.justification.contains("HTTP 503"));
    }

    #[tokio::test]
    async fn test_unparseable_reply_is_soft_failure() {
        let backend = Arc::new(ScriptedBackend::always("No sé qué responder."));
        let taxonomy = Taxonomy::preset("incidentes-leves").unwrap();
        let result = client_with(&backend).classify("texto", &taxonomy).await;

        assert_eq!(result.status, ClassificationStatus::Ok);
        assert_eq!(result.label, "");
        assert_eq!(result.justification, "");
        assert!(result.is_empty_label());
    }

    #[tokio::test]
    async fn test_empty_text_still_calls_backend() {
        let backend = Arc::new(ScriptedBackend::always("Categoría: Otros\nRazón: vacío"));
        let taxonomy = Taxonomy::preset("incidentes-leves").unwrap();
        let result = client_with(&backend).classify("", &taxonomy).await;

        assert_eq!(backend.calls(), 1);
        assert_eq!(result.label, "Otros");
    }

    #[tokio::test]
    async fn test_long_text_truncated() {
        let backend = Arc::new(ScriptedBackend::always("Categoría: Otros"));
        let taxonomy = Taxonomy::new("t", ["Otros"]);
        let client = client_with(&backend).with_max_content_chars(10);
        client.classify(&"ñ".repeat(20), &taxonomy).await;

        let prompt = &backend.prompts()[0];
        assert!(prompt.contains(&format!("Texto: {}\n", "ñ".repeat(10))));
        assert!(!prompt.contains(&"ñ".repeat(11)));
    }

    #[tokio::test]
    async fn test_generation_params_forwarded() {
        let backend = Arc::new(ScriptedBackend::always("Categoría: A"));
        let taxonomy = Taxonomy::new("t", ["A"]);
        let client = client_with(&backend).with_params(GenerationParams::gemini_defaults());
        client.classify("x", &taxonomy).await;
        assert_eq!(backend.params(), vec![GenerationParams::gemini_defaults()]);
    }

    #[tokio::test]
    async fn test_reserved_and_unknown_labels_pass_through() {
        let backend = Arc::new(ScriptedBackend::new([
            Scripted::Reply("Tipo de Incidente: REVISAR\nRazón: ambiguo".to_string()),
            Scripted::Reply("Tipo de Incidente: DESCARRILAMIENTO\nRazón: x".to_string()),
        ]));
        let taxonomy = Taxonomy::preset("ferroviario").unwrap();
        let client = client_with(&backend);

        let review = client.classify("a", &taxonomy).await;
        assert_eq!(review.label, "REVISAR");
        assert!(review.is_reserved(&taxonomy));

        let unknown = client.classify("b", &taxonomy).await;
        assert_eq!(unknown.label, "DESCARRILAMIENTO");
        assert!(!unknown.is_reserved(&taxonomy));
        assert!(!taxonomy.contains_label(&unknown.label));
    }

    /// Picks the label from the report text; the justification varies per call.
    struct DeterministicBackend {
        calls: std::sync::atomic::AtomicUsize,
    }

    #[async_trait::async_trait]
    impl LlmBackend for DeterministicBackend {
        fn name(&self) -> &str {
            "Deterministic"
        }

        fn model(&self) -> &str {
            "fixed"
        }

        async fn is_available(&self) -> bool {
            true
        }

        async fn invoke(&self, prompt: &str, params: &GenerationParams) -> Result<String, LlmError> {
            let n = self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            if params.temperature != Some(0.0) {
                return Err(LlmError::Api("expected temperature 0".to_string()));
            }
            let text = prompt.rsplit("Texto: ").next().unwrap_or("");
            let label = if text.contains("roto") {
                "BARRERA ROTA"
            } else {
                "FILA SIN EVENTOS"
            };
            Ok(format!("Tipo de Incidente: {}\nRazón: intento {}", label, n))
        }
    }

    #[tokio::test]
    async fn test_same_text_same_label_at_temperature_zero() {
        let backend = Arc::new(DeterministicBackend {
            calls: std::sync::atomic::AtomicUsize::new(0),
        });
        let params = GenerationParams {
            temperature: Some(0.0),
            ..GenerationParams::gemini_defaults()
        };
        let client = ClassificationClient::new(backend).with_params(params);
        let taxonomy = Taxonomy::preset("ferroviario").unwrap();

        for text in ["brazo descendente roto en PAN Rivadavia", "tren llegó a horario"] {
            let first = client.classify(text, &taxonomy).await;
            assert!(!first.is_failed());
            for _ in 0..3 {
                let again = client.classify(text, &taxonomy).await;
                assert_eq!(again.label, first.label);
                assert_ne!(again.justification, first.justification);
            }
        }
    }

    #[test]
    fn test_failed_never_has_empty_diagnostic() {
        let result = ClassificationResult::failed("  ");
        assert_eq!(result.justification, "Error sin mensaje");
        assert_eq!(result.label, "ERROR");
        assert!(!result.is_empty_label());
    }
}
