//! Request boundary: search → budget context → generate.
//!
//! Generation failures stop here. They are logged in full and replaced by a fixed
//! message for the user. Retrieval failures are returned to the caller.

use serde::Serialize;

use crate::budget::ContextBudgeter;
use crate::embedder::Embedder;
use crate::engine::{EngineError, SearchEngine, SearchResult};
use crate::generate::{LanguageModel, ResponseGenerator};

/// Answer to one query.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    /// Model output, or a user-facing failure message.
    pub text: String,
    /// Ranked search results the context was drawn from.
    pub sources: Vec<SearchResult>,
    /// The context was cut with the character approximation after a tokenizer failure.
    pub used_fallback: bool,
    /// Set when `text` is a failure message instead of a model answer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

pub struct Assistant<E, M> {
    engine: SearchEngine<E>,
    budgeter: ContextBudgeter,
    generator: ResponseGenerator<M>,
    top_k: usize,
}

impl<E: Embedder, M: LanguageModel> Assistant<E, M> {
    pub fn new(
        engine: SearchEngine<E>,
        budgeter: ContextBudgeter,
        generator: ResponseGenerator<M>,
        top_k: usize,
    ) -> Self {
        Self {
            engine,
            budgeter,
            generator,
            top_k,
        }
    }

    pub fn engine(&self) -> &SearchEngine<E> {
        &self.engine
    }

    /// Retrieve context for `query` and ask the model.
    pub async fn ask(&self, query: &str) -> Result<Answer, EngineError> {
        let sources = self.engine.search(query, self.top_k).await?;
        let context = self.budgeter.build(&sources);
        if context.truncated {
            tracing::debug!(
                chars = context.text.len(),
                fallback = context.used_fallback,
                "context truncated to budget"
            );
        }

        let (text, failure) = match self.generator.generate(&context.text, query).await {
            Ok(text) => (text, None),
            Err(e) => {
                tracing::error!(kind = %e.kind, error = %e.detail, "error generating response");
                (e.kind.user_message().to_string(), Some(e.kind.to_string()))
            }
        };

        Ok(Answer {
            text,
            sources,
            used_fallback: context.used_fallback,
            failure,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::budget::testing::{BrokenTokenizer, WordTokenizer};
    use crate::engine::testing::{FailingEmbedder, VocabEmbedder, DIGILOCKER_VOCAB};
    use crate::engine::EngineConfig;
    use crate::generate::testing::ScriptedModel;
    use crate::generate::GenerationErrorKind;

    const DOCS: &[&str] = &[
        "DigiLocker is a government document wallet.",
        "Users can upload and verify documents.",
    ];

    async fn assistant_with(
        dir: &tempfile::TempDir,
        budgeter: ContextBudgeter,
        model: ScriptedModel,
    ) -> Assistant<VocabEmbedder, ScriptedModel> {
        let embedder = VocabEmbedder::new(DIGILOCKER_VOCAB);
        let config = EngineConfig {
            storage_path: dir.path().join("vector_db"),
            dim: embedder.dim(),
        };
        let engine = SearchEngine::open(embedder, config).unwrap();
        let texts: Vec<String> = DOCS.iter().map(|d| d.to_string()).collect();
        engine.add_data(&texts).await.unwrap();
        Assistant::new(engine, budgeter, ResponseGenerator::new(model, "m"), 5)
    }

    #[tokio::test]
    async fn answer_uses_both_top_passages() {
        let tmp = tempfile::tempdir().unwrap();
        let budgeter = ContextBudgeter::default().with_tokenizer(WordTokenizer);
        let assistant =
            assistant_with(&tmp, budgeter, ScriptedModel::answering("A document wallet.")).await;

        let answer = assistant.ask("What is DigiLocker?").await.unwrap();
        assert_eq!(answer.text, "A document wallet.");
        assert!(answer.failure.is_none());
        assert_eq!(answer.sources[0].text, DOCS[0]);

        let prompt = assistant.generator.model_prompt().unwrap();
        assert!(prompt.contains(&format!("Context:\n{}\n{}\n\nQuestion:", DOCS[0], DOCS[1])));
    }

    #[tokio::test]
    async fn generation_failure_becomes_user_message() {
        let tmp = tempfile::tempdir().unwrap();
        let assistant = assistant_with(
            &tmp,
            ContextBudgeter::default(),
            ScriptedModel::failing(GenerationErrorKind::Unavailable),
        )
        .await;

        let answer = assistant.ask("What is DigiLocker?").await.unwrap();
        assert_eq!(answer.text, GenerationErrorKind::Unavailable.user_message());
        assert_eq!(answer.failure.as_deref(), Some("unavailable"));
        assert!(!answer.text.contains("500"));
    }

    #[tokio::test]
    async fn tokenizer_failure_still_answers() {
        let tmp = tempfile::tempdir().unwrap();
        let budgeter = ContextBudgeter::new(3).with_tokenizer(BrokenTokenizer);
        let assistant = assistant_with(&tmp, budgeter, ScriptedModel::answering("ok")).await;

        let answer = assistant.ask("What is DigiLocker?").await.unwrap();
        assert_eq!(answer.text, "ok");
        assert!(answer.used_fallback);
        let prompt = assistant.generator.model_prompt().unwrap();
        assert!(prompt.contains("Context:\nDigiLocker i\n\nQuestion:"));
    }

    #[tokio::test]
    async fn empty_corpus_asks_with_empty_context() {
        let tmp = tempfile::tempdir().unwrap();
        let embedder = VocabEmbedder::new(DIGILOCKER_VOCAB);
        let config = EngineConfig {
            storage_path: tmp.path().join("vector_db"),
            dim: embedder.dim(),
        };
        let engine = SearchEngine::open(embedder, config).unwrap();
        let assistant = Assistant::new(
            engine,
            ContextBudgeter::default(),
            ResponseGenerator::new(ScriptedModel::answering("I don't know"), "m"),
            5,
        );
        let answer = assistant.ask("anything").await.unwrap();
        assert!(answer.sources.is_empty());
        assert!(assistant
            .generator
            .model_prompt()
            .unwrap()
            .contains("Context:\n\n\nQuestion:\nanything"));
    }

    #[tokio::test]
    async fn embedding_failure_is_returned() {
        let tmp = tempfile::tempdir().unwrap();
        let config = EngineConfig {
            storage_path: tmp.path().join("vector_db"),
            dim: 4,
        };
        // Seed storage so search actually embeds.
        {
            let embedder = crate::engine::testing::ShortEmbedder(4);
            let engine = SearchEngine::open(embedder, config.clone()).unwrap();
            engine.add_data(&["x".to_string()]).await.unwrap();
        }
        let engine = SearchEngine::open(FailingEmbedder, config).unwrap();
        let assistant = Assistant::new(
            engine,
            ContextBudgeter::default(),
            ResponseGenerator::new(ScriptedModel::answering("unused"), "m"),
            5,
        );
        assert!(matches!(
            assistant.ask("q").await,
            Err(EngineError::Embedding(_))
        ));
    }
}
