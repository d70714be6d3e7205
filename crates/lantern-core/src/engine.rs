//! Search engine: embedder + vector index + document store + persistence.
//!
//! The corpus is an immutable snapshot swapped atomically after each commit. Readers
//! load the current snapshot and never see a half-applied batch. Writers serialize on
//! an async mutex held across embed, persist and publish. Persist and publish run in
//! one blocking task that owns the lock, so a dropped `add_data` future cannot leave
//! disk ahead of memory.

use std::path::PathBuf;
use std::sync::Arc;

use arc_swap::ArcSwap;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::embedder::{validate_batch, Embedder, EmbeddingError};
use crate::persist::{self, PersistError, StoragePaths};
use crate::store::{DocumentStore, StoreError};
use crate::vector_index::{IndexError, VectorIndex};

/// Default number of results for [`SearchEngine::search`].
pub const DEFAULT_TOP_K: usize = 5;

/// Construction-time settings. Fixed for the lifetime of an engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Logical storage path; artifacts are `<path>.json` and `<path>.index`.
    pub storage_path: PathBuf,
    /// Embedding dimension.
    pub dim: usize,
}

/// A search hit. `score` is the squared L2 distance (lower is closer).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub text: String,
    pub score: f32,
}

/// One entry of [`SearchEngine::view_index`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexEntry {
    pub index: usize,
    pub text: String,
}

#[derive(Debug, Clone)]
struct Corpus {
    index: VectorIndex,
    store: DocumentStore,
}

pub struct SearchEngine<E> {
    embedder: E,
    paths: StoragePaths,
    dim: usize,
    corpus: Arc<ArcSwap<Corpus>>,
    writer: Arc<Mutex<()>>,
}

impl<E: Embedder> SearchEngine<E> {
    /// Open the engine, restoring any stored data at `config.storage_path`.
    pub fn open(embedder: E, config: EngineConfig) -> Result<Self, EngineError> {
        let paths = StoragePaths::new(&config.storage_path);
        let (index, store) = persist::load(&paths, config.dim)?;
        Ok(Self {
            embedder,
            paths,
            dim: config.dim,
            corpus: Arc::new(ArcSwap::from_pointee(Corpus { index, store })),
            writer: Arc::new(Mutex::new(())),
        })
    }

    pub fn embedder(&self) -> &E {
        &self.embedder
    }

    pub fn storage_paths(&self) -> &StoragePaths {
        &self.paths
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.corpus.load().store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Embed, index and persist `texts` as one batch.
    ///
    /// Empty input does nothing. On any failure the in-memory corpus is unchanged.
    pub async fn add_data(&self, texts: &[String]) -> Result<(), EngineError> {
        if texts.is_empty() {
            return Ok(());
        }
        let guard = Arc::clone(&self.writer).lock_owned().await;

        let vectors = self.embedder.encode(texts).await?;
        validate_batch(&vectors, texts.len(), self.dim)?;

        let current = self.corpus.load_full();
        let mut next = Corpus::clone(&current);
        next.index.add(&vectors)?;
        for text in texts {
            next.store.append(text.as_str());
        }
        debug_assert_eq!(next.index.len(), next.store.len());

        // From here on the commit completes even if this future is dropped.
        let corpus = Arc::clone(&self.corpus);
        let paths = self.paths.clone();
        let total = tokio::task::spawn_blocking(move || {
            let _guard = guard;
            if let Err(e) = persist::save(&next.index, &next.store, &paths) {
                if matches!(e, PersistError::Inconsistent(..)) {
                    restore_previous(&current, &paths);
                }
                return Err(e);
            }
            let total = next.store.len();
            corpus.store(Arc::new(next));
            Ok::<_, PersistError>(total)
        })
        .await
        .map_err(|e| EngineError::Task(e.to_string()))??;

        tracing::info!(added = texts.len(), total, "committed batch");
        Ok(())
    }

    /// Nearest stored texts to `query`, closest first.
    pub async fn search(&self, query: &str, top_k: usize) -> Result<Vec<SearchResult>, EngineError> {
        if top_k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }
        let mut vectors = self.embedder.encode(&[query.to_string()]).await?;
        validate_batch(&vectors, 1, self.dim)?;
        let query_vector = vectors.swap_remove(0);

        let snapshot = self.corpus.load_full();
        let hits = snapshot.index.search(&query_vector, top_k)?;
        let results = hits
            .into_iter()
            .map(|hit| {
                Ok(SearchResult {
                    text: snapshot.store.get(hit.identity)?.to_string(),
                    score: hit.distance,
                })
            })
            .collect::<Result<Vec<_>, StoreError>>()?;
        tracing::debug!(top_k, hits = results.len(), "search");
        Ok(results)
    }

    /// Every stored `(identity, text)` pair in order.
    pub fn view_index(&self) -> Vec<IndexEntry> {
        self.corpus
            .load()
            .store
            .iter()
            .map(|(index, text)| IndexEntry {
                index,
                text: text.to_string(),
            })
            .collect()
    }
}

/// Rewrite the last published pair after a half-replaced save.
fn restore_previous(current: &Corpus, paths: &StoragePaths) {
    match persist::save(&current.index, &current.store, paths) {
        Ok(()) => tracing::warn!(
            records = current.store.len(),
            "restored previous stored pair after failed commit"
        ),
        Err(e) => tracing::error!(error = %e, "could not restore previous stored pair"),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),
    #[error("storage error: {0}")]
    Persist(#[from] PersistError),
    #[error("index error: {0}")]
    Index(#[from] IndexError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("background task failed: {0}")]
    Task(String),
}
