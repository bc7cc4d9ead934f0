//! Layered configuration and path helpers.
//!
//! Uses Figment to merge built-in defaults + `config.toml` + `config.<env>.toml`
//! + `APP_*` env vars (nested keys separated by `__`, e.g.
//! `APP_EMBEDDING__PROVIDER=hash`). Provides helpers to expand `~` and `${VAR}`
//! and to resolve relative paths against a known base directory.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::chunker::ChunkingConfig;
use crate::error::{Error, Result};

pub struct Config {
    figment: Figment,
}

impl Config {
    /// Load from `config.toml` in the working directory.
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new("config.toml"))
    }

    /// Load with `base` as the main file; the env-specific overlay is looked up next to it.
    pub fn load_from(base: &Path) -> Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
        let dir = base.parent().unwrap_or_else(|| Path::new(""));

        let mut figment = Figment::from(Serialized::defaults(Settings::default())).merge(Toml::file(base));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file(dir.join("config.dev.toml"))),
            "prod" | "production" => figment = figment.merge(Toml::file(dir.join("config.prod.toml"))),
            "test" | "testing" => figment = figment.merge(Toml::file(dir.join("config.test.toml"))),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        Ok(Self { figment })
    }

    pub fn from_figment(figment: Figment) -> Self {
        Self { figment }
    }

    pub fn get<T>(&self, key: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| Error::InvalidConfig(format!("Failed to get '{key}': {e}")))
    }

    pub fn settings(&self) -> Result<Settings> {
        let settings: Settings = self
            .figment
            .extract()
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub data: DataSettings,
    pub chunking: ChunkingConfig,
    pub embedding: EmbeddingSettings,
    pub context: ContextSettings,
    pub ingest: IngestSettings,
    pub retrieval: RetrievalSettings,
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        if self.chunking.max_tokens == 0 {
            return Err(Error::InvalidConfig("chunking.max_tokens must be positive".into()));
        }
        if !(0.0..1.0).contains(&self.chunking.overlap_percent) {
            return Err(Error::InvalidConfig("chunking.overlap_percent must be in [0, 1)".into()));
        }
        if self.embedding.dim == 0 || self.embedding.batch_size == 0 {
            return Err(Error::InvalidConfig("embedding.dim and embedding.batch_size must be positive".into()));
        }
        if self.ingest.max_attempts == 0 || self.ingest.concurrency == 0 {
            return Err(Error::InvalidConfig("ingest.max_attempts and ingest.concurrency must be positive".into()));
        }
        if self.retrieval.candidate_factor == 0
            || self.retrieval.random_pool_factor == 0
            || self.retrieval.vector_overfetch == 0
        {
            return Err(Error::InvalidConfig("retrieval factors must be positive".into()));
        }
        if self.context.provider != ContextProviderKind::None && self.context.max_tokens == 0 {
            return Err(Error::InvalidConfig("context.max_tokens must be positive".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSettings {
    pub root: String,
    /// Relative to `root` unless absolute.
    pub registry_file: String,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self { root: "./data".into(), registry_file: "registry.json".into() }
    }
}

impl DataSettings {
    pub fn root_path(&self) -> PathBuf {
        expand_path(&self.root)
    }

    pub fn registry_path(&self) -> PathBuf {
        resolve_with_base(&self.root_path(), &self.registry_file)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProviderKind {
    OpenAi,
    Hash,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub provider: EmbeddingProviderKind,
    pub base_url: String,
    pub model: String,
    /// Name of the env var holding the API key; the key itself never lives in config files.
    pub api_key_env: String,
    pub dim: usize,
    pub batch_size: usize,
    pub timeout_secs: u64,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: EmbeddingProviderKind::OpenAi,
            base_url: "https://api.openai.com/v1".into(),
            model: "text-embedding-3-small".into(),
            api_key_env: "OPENAI_API_KEY".into(),
            dim: 1536,
            batch_size: 32,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ContextProviderKind {
    /// Chunks are indexed as-is.
    None,
    OpenAi,
}

/// Optional per-chunk summaries from an OpenAI-compatible chat endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextSettings {
    pub provider: ContextProviderKind,
    pub base_url: String,
    pub model: String,
    pub api_key_env: String,
    /// Source bytes sent on each side of the chunk.
    pub window_radius: usize,
    /// Completion budget for one summary.
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl Default for ContextSettings {
    fn default() -> Self {
        Self {
            provider: ContextProviderKind::None,
            base_url: "https://api.openai.com/v1".into(),
            model: "gpt-4o-mini".into(),
            api_key_env: "OPENAI_API_KEY".into(),
            window_radius: 10_000,
            max_tokens: 200,
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestSettings {
    pub max_attempts: u32,
    pub backoff_ms: u64,
    pub concurrency: usize,
    pub show_progress: bool,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self { max_attempts: 3, backoff_ms: 500, concurrency: 1, show_progress: false }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub rrf_k: usize,
    pub candidate_factor: usize,
    pub min_candidates: usize,
    pub random_pool_factor: usize,
    pub vector_overfetch: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self { rrf_k: 60, candidate_factor: 3, min_candidates: 10, random_pool_factor: 3, vector_overfetch: 2 }
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
