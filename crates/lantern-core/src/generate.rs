//! Prompt construction and answer generation.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;

/// Instructions placed before the context. Asking the model to admit ignorance is a
/// prompting convention; nothing checks that the answer is grounded.
pub const SYSTEM_PROMPT: &str = "You are a DigiLocker assistant.\n\
You will answer the questions based on the provided context.\n\
If you don't know the answer, say 'I don't know'.";

pub const DEFAULT_TEMPERATURE: f32 = 0.2;
pub const DEFAULT_MAX_TOKENS: u32 = 4000;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Sampling settings passed to the model with every prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationParams {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Text-completion collaborator.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, prompt: &str, params: &GenerationParams) -> Result<String, GenerationError>;
}

/// Coarse failure category, used to pick a user-facing message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationErrorKind {
    /// Prompt or requested output exceeded the model's limits.
    TokenLimit,
    /// Transport, authentication, rate limiting or server failure.
    Unavailable,
    Timeout,
    Other,
}

impl GenerationErrorKind {
    /// Fixed message safe to show an end user.
    pub fn user_message(self) -> &'static str {
        match self {
            Self::TokenLimit => "Something went wrong! The query used too many tokens.",
            Self::Unavailable => {
                "I'm having trouble connecting to my knowledge base. Please try again later."
            }
            Self::Timeout => "The request timed out. Please try a shorter or simpler question.",
            Self::Other => "I apologize, but I encountered an issue processing your request.",
        }
    }
}

impl fmt::Display for GenerationErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::TokenLimit => "token limit",
            Self::Unavailable => "unavailable",
            Self::Timeout => "timeout",
            Self::Other => "other",
        };
        f.write_str(s)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("generation failed ({kind}): {detail}")]
pub struct GenerationError {
    pub kind: GenerationErrorKind,
    pub detail: String,
}

impl GenerationError {
    pub fn new(kind: GenerationErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }
}

/// Single prompt: system instructions, labeled context, labeled question.
pub fn build_prompt(system: &str, context: &str, query: &str) -> String {
    format!("{system}\n\nContext:\n{context}\n\nQuestion:\n{query}")
}

/// Builds prompts and calls the language model under a timeout.
pub struct ResponseGenerator<M> {
    model: M,
    params: GenerationParams,
    system_prompt: String,
    timeout: Duration,
}

impl<M: LanguageModel> ResponseGenerator<M> {
    pub fn new(model: M, model_id: impl Into<String>) -> Self {
        Self {
            model,
            params: GenerationParams {
                model: model_id.into(),
                temperature: DEFAULT_TEMPERATURE,
                max_tokens: DEFAULT_MAX_TOKENS,
            },
            system_prompt: SYSTEM_PROMPT.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.params.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.params.max_tokens = max_tokens;
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn params(&self) -> &GenerationParams {
        &self.params
    }

    /// Answer `query` from `context`.
    pub async fn generate(&self, context: &str, query: &str) -> Result<String, GenerationError> {
        let prompt = build_prompt(&self.system_prompt, context, query);
        tracing::debug!(
            model = %self.params.model,
            prompt_chars = prompt.len(),
            "generating answer"
        );
        match tokio::time::timeout(self.timeout, self.model.complete(&prompt, &self.params)).await {
            Ok(res) => res,
            Err(_) => Err(GenerationError::new(
                GenerationErrorKind::Timeout,
                format!("no response within {:?}", self.timeout),
            )),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::ScriptedModel;
    use super::*;

    #[test]
    fn prompt_has_labeled_sections() {
        let prompt = build_prompt("SYS", "some context", "a question?");
        assert_eq!(prompt, "SYS\n\nContext:\nsome context\n\nQuestion:\na question?");
    }

    #[tokio::test]
    async fn generate_sends_prompt_and_fixed_params() {
        let generator = ResponseGenerator::new(ScriptedModel::answering("It is a wallet."), "llama3.1:8b");
        let answer = generator.generate("ctx", "What is DigiLocker?").await.unwrap();
        assert_eq!(answer, "It is a wallet.");

        let prompts = generator.model.prompts.lock().unwrap();
        let (prompt, params) = &prompts[0];
        assert!(prompt.starts_with(SYSTEM_PROMPT));
        assert!(prompt.ends_with("Context:\nctx\n\nQuestion:\nWhat is DigiLocker?"));
        assert_eq!(params.temperature, DEFAULT_TEMPERATURE);
        assert_eq!(params.max_tokens, DEFAULT_MAX_TOKENS);
        assert_eq!(params.model, "llama3.1:8b");
    }

    #[tokio::test]
    async fn model_errors_pass_through() {
        let generator = ResponseGenerator::new(
            ScriptedModel::failing(GenerationErrorKind::TokenLimit),
            "m",
        );
        let err = generator.generate("", "q").await.unwrap_err();
        assert_eq!(err.kind, GenerationErrorKind::TokenLimit);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_model_times_out() {
        let mut model = ScriptedModel::answering("late");
        model.delay = Some(Duration::from_secs(120));
        let generator = ResponseGenerator::new(model, "m").with_timeout(Duration::from_secs(5));
        let err = generator.generate("", "q").await.unwrap_err();
        assert_eq!(err.kind, GenerationErrorKind::Timeout);
    }

    #[test]
    fn every_kind_has_a_distinct_message() {
        let kinds = [
            GenerationErrorKind::TokenLimit,
            GenerationErrorKind::Unavailable,
            GenerationErrorKind::Timeout,
            GenerationErrorKind::Other,
        ];
        let mut messages: Vec<_> = kinds.iter().map(|k| k.user_message()).collect();
        messages.sort();
        messages.dedup();
        assert_eq!(messages.len(), kinds.len());
    }
}
