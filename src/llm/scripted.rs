//! Scripted backend for unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use super::backend::{GenerationParams, LlmBackend, LlmError};

/// One canned answer.
#[derive(Debug, Clone)]
pub enum Scripted {
    Reply(String),
    Fail(String),
}

/// Replays a fixed sequence of answers and records every prompt it receives.
/// Once the script is exhausted it keeps returning `fallback`.
pub struct ScriptedBackend {
    script: Mutex<VecDeque<Scripted>>,
    fallback: Scripted,
    prompts: Mutex<Vec<String>>,
    params: Mutex<Vec<GenerationParams>>,
}

impl ScriptedBackend {
    pub fn new(script: impl IntoIterator<Item = Scripted>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            fallback: Scripted::Fail("script exhausted".to_string()),
            prompts: Mutex::new(Vec::new()),
            params: Mutex::new(Vec::new()),
        }
    }

    /// Answer every call with the same reply.
    pub fn always(reply: &str) -> Self {
        Self::new(Vec::new()).with_fallback(Scripted::Reply(reply.to_string()))
    }

    /// Fail every call.
    pub fn failing(message: &str) -> Self {
        Self::new(Vec::new()).with_fallback(Scripted::Fail(message.to_string()))
    }

    pub fn with_fallback(mut self, fallback: Scripted) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn params(&self) -> Vec<GenerationParams> {
        self.params.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "Scripted"
    }

    fn model(&self) -> &str {
        "scripted"
    }

    async fn is_available(&self) -> bool {
        true
    }

    async fn invoke(&self, prompt: &str, params: &GenerationParams) -> Result<String, LlmError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.params.lock().unwrap().push(*params);
        let next = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());
        match next {
            Scripted::Reply(text) => Ok(text),
            Scripted::Fail(message) => Err(LlmError::Api(message)),
        }
    }
}
