//! Ingest pipeline: scan → chunk → embed → index → persist.

use std::path::Path;

use crate::chunks::chunk_sources;
use crate::embedder::Embedder;
use crate::engine::{EngineError, SearchEngine};
use crate::sources::{read_source, scan_sources, ScanError, SourceDoc};

/// What an ingest run added.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestReport {
    pub documents: usize,
    pub chunks: usize,
}

/// Ingest every text document under `root` (or the single file `root`) as one batch.
pub async fn ingest_path<E: Embedder>(
    engine: &SearchEngine<E>,
    root: &Path,
    max_chars: usize,
) -> Result<IngestReport, IngestError> {
    let docs = if root.is_file() {
        vec![read_source(root)?]
    } else {
        scan_sources(root)?
    };
    ingest_docs(engine, &docs, max_chars).await
}

/// Chunk `docs` and add all chunks in one `add_data` call.
pub async fn ingest_docs<E: Embedder>(
    engine: &SearchEngine<E>,
    docs: &[SourceDoc],
    max_chars: usize,
) -> Result<IngestReport, IngestError> {
    let chunks = chunk_sources(docs, max_chars);
    let texts: Vec<String> = chunks.into_iter().map(|c| c.text).collect();
    engine.add_data(&texts).await?;
    tracing::info!(documents = docs.len(), chunks = texts.len(), "ingested");
    Ok(IngestReport {
        documents: docs.len(),
        chunks: texts.len(),
    })
}

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("scan error: {0}")]
    Scan(#[from] ScanError),
    #[error(transparent)]
    Engine(#[from] EngineError),
}
