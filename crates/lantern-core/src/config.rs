//! Persisted config (storage path, models, budgets) in the app data directory.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{app_data, budget, engine, generate, ollama, openai};

const CONFIG_FILENAME: &str = "config.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Logical storage path of the vector store. Defaults to `<app data>/vector_db`.
    pub storage_path: Option<String>,
    /// Directory `ingest` reads when no path is given.
    pub sources_root: Option<String>,
    pub ollama_url: String,
    pub embed_model: String,
    /// Embedding dimension; must match `embed_model`.
    pub dim: usize,
    /// OpenAI-compatible API base for answer generation.
    pub llm_base_url: String,
    pub llm_model: String,
    /// Name of the environment variable holding the API key, if one is needed.
    pub api_key_env: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub request_timeout_secs: u64,
    /// Context budget in tokens.
    pub context_budget: usize,
    pub context_top_n: usize,
    pub search_top_k: usize,
    pub chunk_max_chars: usize,
    /// Optional `tokenizer.json` for token-aware truncation.
    pub tokenizer_path: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage_path: None,
            sources_root: None,
            ollama_url: ollama::DEFAULT_BASE_URL.to_string(),
            embed_model: ollama::DEFAULT_EMBED_MODEL.to_string(),
            dim: 384,
            llm_base_url: openai::DEFAULT_BASE_URL.to_string(),
            llm_model: "llama3.1:8b".to_string(),
            api_key_env: "LANTERN_API_KEY".to_string(),
            temperature: generate::DEFAULT_TEMPERATURE,
            max_tokens: generate::DEFAULT_MAX_TOKENS,
            request_timeout_secs: generate::DEFAULT_TIMEOUT.as_secs(),
            context_budget: budget::DEFAULT_TOKEN_BUDGET,
            context_top_n: budget::DEFAULT_TOP_N,
            search_top_k: engine::DEFAULT_TOP_K,
            chunk_max_chars: crate::chunks::DEFAULT_MAX_CHARS,
            tokenizer_path: None,
        }
    }
}

impl Config {
    /// Resolved storage path, falling back to the app data directory.
    pub fn storage_path(&self) -> Option<PathBuf> {
        self.storage_path
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
            .or_else(app_data::default_storage_path)
    }

    /// API key read from the environment variable named by `api_key_env`.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env).ok().filter(|k| !k.is_empty())
    }

    pub fn tokenizer_path(&self) -> Option<PathBuf> {
        self.tokenizer_path
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
    }
}

/// Path of the config file in the app data directory.
pub fn config_path() -> Option<PathBuf> {
    app_data::app_data_dir().map(|d| d.join(CONFIG_FILENAME))
}

/// Load config from the app data directory. Returns default config if missing or invalid.
pub fn load_config() -> Config {
    match config_path() {
        Some(path) => load_config_from(&path),
        None => Config::default(),
    }
}

/// Load config from `path`. Returns default config if missing or invalid.
pub fn load_config_from(path: &Path) -> Config {
    let Ok(s) = std::fs::read_to_string(path) else {
        return Config::default();
    };
    toml::from_str(&s).unwrap_or_else(|e| {
        tracing::warn!(path = %path.display(), error = %e, "invalid config, using defaults");
        Config::default()
    })
}

/// Save config to the app data directory.
pub fn save_config(config: &Config) -> Result<(), ConfigError> {
    let path = config_path().ok_or(ConfigError::NoDataDir)?;
    save_config_to(config, &path)
}

pub fn save_config_to(config: &Config, path: &Path) -> Result<(), ConfigError> {
    let s = toml::to_string_pretty(config).map_err(ConfigError::Serialize)?;
    std::fs::write(path, s).map_err(ConfigError::Write)
}

/// Get the configured sources root, if any.
pub fn get_sources_root() -> Option<PathBuf> {
    load_config()
        .sources_root
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
}

/// Set and persist the sources root in the app data config.
pub fn set_sources_root(path: &Path) -> Result<(), ConfigError> {
    let config_file = config_path().ok_or(ConfigError::NoDataDir)?;
    set_sources_root_in(path, &config_file)
}

/// Set and persist the sources root in `config_file`, keeping its other settings.
pub fn set_sources_root_in(path: &Path, config_file: &Path) -> Result<(), ConfigError> {
    let path = path.canonicalize().map_err(ConfigError::Canonicalize)?;
    if !path.is_dir() {
        return Err(ConfigError::NotADirectory(path));
    }
    let mut config = load_config_from(config_file);
    config.sources_root = Some(path.to_string_lossy().into_owned());
    save_config_to(&config, config_file)
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not determine app data directory")]
    NoDataDir,
    #[error("failed to serialize config: {0}")]
    Serialize(toml::ser::Error),
    #[error("failed to write config: {0}")]
    Write(std::io::Error),
    #[error("failed to resolve path: {0}")]
    Canonicalize(std::io::Error),
    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),
}
