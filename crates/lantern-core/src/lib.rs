//! All backend logic independent of how the app is run.
//!
//! Documents are embedded into a flat vector index persisted next to their texts
//! (see [persist]). Queries retrieve the nearest passages, which are trimmed to a
//! context budget and handed to a language model (see [assistant]).

pub mod app_data;
pub mod assistant;
pub mod budget;
pub mod chunks;
pub mod config;
pub mod embedder;
pub mod engine;
pub mod generate;
pub mod ingest;
pub mod ollama;
pub mod openai;
pub mod persist;
pub mod sources;
pub mod store;
pub mod vector_index;

pub use app_data::{app_data_dir, default_storage_path};
pub use assistant::{Answer, Assistant};
pub use budget::{ContextBudgeter, HfTokenizer, Tokenize, TokenizeError, Truncation};
pub use chunks::{chunk_source, chunk_sources, chunk_text, Chunk, DEFAULT_MAX_CHARS};
pub use config::{
    get_sources_root, load_config, load_config_from, save_config, save_config_to,
    set_sources_root, set_sources_root_in, Config, ConfigError,
};
pub use embedder::{Embedder, EmbeddingError};
pub use engine::{EngineConfig, EngineError, IndexEntry, SearchEngine, SearchResult, DEFAULT_TOP_K};
pub use generate::{
    build_prompt, GenerationError, GenerationErrorKind, GenerationParams, LanguageModel,
    ResponseGenerator,
};
pub use ingest::{ingest_docs, ingest_path, IngestError, IngestReport};
pub use ollama::{OllamaClient, OllamaError};
pub use openai::ChatCompletionsClient;
pub use persist::{PersistError, StoragePaths};
pub use sources::{scan_sources, ScanError, SourceDoc};
pub use store::{DocumentRecord, DocumentStore, StoreError};
pub use vector_index::{IndexError, Neighbor, VectorIndex};

/// Returns a short status string. Used to verify the backend is wired up.
pub fn status() -> &'static str {
    "lantern-core ready"
}
