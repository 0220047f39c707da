//! Configuration loader and path helpers.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*` env vars
//! (`__` separates nested keys, e.g. `APP_RETRIEVAL__TOP_K=8`). The typed
//! [`Settings`] view has a default for every field, so an empty configuration
//! is valid outside production.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};

use crate::chunking::ChunkingOptions;
use crate::corpus::StrategyMap;
use crate::error::{Error, Result};
use crate::types::ChunkStrategy;

pub struct Config {
    figment: Figment,
    env_name: String,
    base_dir: PathBuf,
}

impl Config {
    /// Loads from the current directory.
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new("."))
    }

    pub fn load_from(dir: &Path) -> Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(dir.join("config.toml")));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file(dir.join("config.dev.toml"))),
            "prod" | "production" => figment = figment.merge(Toml::file(dir.join("config.prod.toml"))),
            "test" | "testing" => figment = figment.merge(Toml::file(dir.join("config.test.toml"))),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment, env_name, base_dir: dir.to_path_buf() };
        config.validate_for_env()?;
        Ok(config)
    }

    pub fn get<T>(&self, key: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| Error::InvalidConfig(format!("Failed to get '{}': {}", key, e)))
    }

    pub fn settings(&self) -> Result<Settings> {
        self.figment
            .extract()
            .map_err(|e| Error::InvalidConfig(format!("Failed to extract settings: {}", e)))
    }

    pub fn env_name(&self) -> &str {
        &self.env_name
    }

    /// Resolves a configured path against the directory the config came from.
    pub fn path<S: AsRef<str>>(&self, p: S) -> PathBuf {
        resolve_with_base(&self.base_dir, p)
    }

    fn validate_for_env(&self) -> Result<()> {
        let settings = self.settings()?;
        settings.validate()?;
        match self.env_name.as_str() {
            "prod" | "production" => {
                if settings.embedding.backend == EmbeddingBackend::Hashing {
                    return Err(Error::InvalidConfig(
                        "production refuses the hashing embedder; set embedding.backend".into(),
                    ));
                }
            }
            "dev" | "development" => {}
            "test" | "testing" => {}
            _ => {}
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub corpus: CorpusSettings,
    pub chunking: ChunkingOptions,
    pub retrieval: RetrievalSettings,
    pub embedding: EmbeddingSettings,
    pub generation: GenerationSettings,
    pub conversation: ConversationSettings,
    pub escalation: EscalationSettings,
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        if self.chunking.max_len == 0 {
            return Err(Error::InvalidConfig("chunking.max_len must be positive".into()));
        }
        if self.embedding.batch_size == 0 {
            return Err(Error::InvalidConfig("embedding.batch_size must be positive".into()));
        }
        if self.embedding.dimension == 0 {
            return Err(Error::InvalidConfig("embedding.dimension must be positive".into()));
        }
        if self.generation.timeout_secs == 0 {
            return Err(Error::InvalidConfig("generation.timeout_secs must be positive".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorpusSettings {
    /// Directory scanned by the indexer.
    pub input_dir: String,
    /// Directory holding the persisted `(index, chunks)` pairs.
    pub index_dir: String,
    /// Strategy for sources without an explicit entry. Unset means such
    /// sources are skipped.
    pub default_strategy: Option<ChunkStrategy>,
    pub strategies: BTreeMap<String, ChunkStrategy>,
}

impl Default for CorpusSettings {
    fn default() -> Self {
        Self {
            input_dir: "data/input".into(),
            index_dir: "data/output".into(),
            default_strategy: None,
            strategies: BTreeMap::new(),
        }
    }
}

impl CorpusSettings {
    pub fn strategy_map(&self) -> StrategyMap {
        StrategyMap::new(self.default_strategy, self.strategies.clone())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub top_k: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self { top_k: 4 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    /// Deterministic token hashing; for tests and offline development.
    Hashing,
    /// Local BERT-family encoder (requires the `candle` feature).
    Bert,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub backend: EmbeddingBackend,
    pub dimension: usize,
    pub model_dir: Option<String>,
    pub batch_size: usize,
    /// Token budget per input for model backends.
    pub max_tokens: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            backend: EmbeddingBackend::Hashing,
            dimension: 768,
            model_dir: None,
            batch_size: 64,
            max_tokens: 512,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    /// Base URL of an OpenAI-compatible API (llama.cpp, vLLM, Ollama, ...).
    pub base_url: String,
    pub model: String,
    /// Name of the environment variable holding the API key, if any.
    pub api_key_env: Option<String>,
    pub max_tokens: u32,
    pub temperature: f64,
    pub timeout_secs: u64,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434/v1".into(),
            model: "llama3.1".into(),
            api_key_env: None,
            max_tokens: 512,
            temperature: 0.2,
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationSettings {
    pub db_path: String,
    /// Number of past turns fed into the answer prompt.
    pub history_limit: usize,
}

impl Default for ConversationSettings {
    fn default() -> Self {
        Self { db_path: "conversation_memory.db".into(), history_limit: 5 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EscalationSettings {
    pub handoff_message: String,
    /// JSON-lines file receiving escalation notices; logged only when unset.
    pub outbox_path: Option<String>,
    /// Skip classification when retrieval produced no context.
    pub skip_when_context_empty: bool,
}

impl Default for EscalationSettings {
    fn default() -> Self {
        Self {
            handoff_message: "Your request has been forwarded to a human agent via email.".into(),
            outbox_path: None,
            skip_when_context_empty: false,
        }
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
