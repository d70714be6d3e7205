//! Text embedding collaborator.

use async_trait::async_trait;

/// Maps texts to fixed-dimension vectors.
///
/// Must be deterministic for the same input and model version, otherwise stored
/// vectors stop being comparable across restarts.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch. Returns one vector per input, in input order.
    async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;
}

#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    #[error("embedding backend failed: {0}")]
    Backend(String),
    #[error("embedder returned {actual} vectors for {expected} inputs")]
    CountMismatch { expected: usize, actual: usize },
    #[error("embedder returned a vector of {actual} components, expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Check a batch returned by an [`Embedder`] against the request.
pub fn validate_batch(vectors: &[Vec<f32>], inputs: usize, dim: usize) -> Result<(), EmbeddingError> {
    if vectors.len() != inputs {
        return Err(EmbeddingError::CountMismatch {
            expected: inputs,
            actual: vectors.len(),
        });
    }
    if let Some(bad) = vectors.iter().find(|v| v.len() != dim) {
        return Err(EmbeddingError::DimensionMismatch {
            expected: dim,
            actual: bad.len(),
        });
    }
    Ok(())
}
