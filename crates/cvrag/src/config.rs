//! TOML configuration parsing and validation.
//!
//! cvrag is configured through a single TOML file (default
//! `./config/cvrag.toml`):
//!
//! ```toml
//! [db]
//! path = "./data/cvrag.sqlite"
//!
//! [chunking]
//! chunk_size = 1000
//! chunk_overlap = 200
//!
//! [retrieval]
//! result_limit = 10
//! relevance_threshold_ratio = 0.7
//! max_context_length = 8000
//!
//! [embedding]
//! provider = "disabled"   # disabled | openai | ollama | local
//! ```
//!
//! Every section except `[db]` is optional and falls back to the defaults
//! shown above.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use cvrag_core::chunk::{DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
use cvrag_core::retriever::{
    DEFAULT_MAX_CONTEXT_LENGTH, DEFAULT_RELEVANCE_THRESHOLD_RATIO, DEFAULT_RESULT_LIMIT,
};
use cvrag_core::RetrievalConfig;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalSection,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}
fn default_chunk_overlap() -> usize {
    DEFAULT_CHUNK_OVERLAP
}

/// Raw `[retrieval]` table. Converted into the validated core
/// [`RetrievalConfig`] by [`RetrievalSection::to_core`].
#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalSection {
    #[serde(default = "default_result_limit")]
    pub result_limit: usize,
    #[serde(default = "default_threshold_ratio")]
    pub relevance_threshold_ratio: f64,
    #[serde(default = "default_max_context_length")]
    pub max_context_length: usize,
}

impl Default for RetrievalSection {
    fn default() -> Self {
        Self {
            result_limit: DEFAULT_RESULT_LIMIT,
            relevance_threshold_ratio: DEFAULT_RELEVANCE_THRESHOLD_RATIO,
            max_context_length: DEFAULT_MAX_CONTEXT_LENGTH,
        }
    }
}

impl RetrievalSection {
    pub fn to_core(&self) -> Result<RetrievalConfig> {
        RetrievalConfig::new(
            self.result_limit,
            self.relevance_threshold_ratio,
            self.max_context_length,
        )
        .map_err(|e| anyhow::anyhow!("retrieval: {}", e))
    }
}

fn default_result_limit() -> usize {
    DEFAULT_RESULT_LIMIT
}
fn default_threshold_ratio() -> f64 {
    DEFAULT_RELEVANCE_THRESHOLD_RATIO
}
fn default_max_context_length() -> usize {
    DEFAULT_MAX_CONTEXT_LENGTH
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL for the Ollama provider.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            url: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

/// Parse and validate configuration text.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    if config.chunking.chunk_size == 0 {
        bail!("chunking.chunk_size must be > 0");
    }
    if config.chunking.chunk_overlap >= config.chunking.chunk_size {
        bail!("chunking.chunk_overlap must be smaller than chunking.chunk_size");
    }

    config.retrieval.to_core()?;

    match config.embedding.provider.as_str() {
        "disabled" | "local" => {}
        "openai" | "ollama" => {
            if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
                bail!(
                    "embedding.dims must be > 0 when provider is '{}'",
                    config.embedding.provider
                );
            }
            if config.embedding.model.is_none() {
                bail!(
                    "embedding.model must be specified when provider is '{}'",
                    config.embedding.provider
                );
            }
        }
        other => bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, ollama, or local.",
            other
        ),
    }
    if config.embedding.batch_size == 0 {
        bail!("embedding.batch_size must be > 0");
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = parse_config("[db]\npath = \"./data/cvrag.sqlite\"\n").unwrap();
        assert_eq!(config.chunking.chunk_size, 1000);
        assert_eq!(config.chunking.chunk_overlap, 200);
        assert_eq!(config.retrieval.result_limit, 10);
        assert!(!config.embedding.is_enabled());

        let core = config.retrieval.to_core().unwrap();
        assert_eq!(core, RetrievalConfig::default());
    }

    #[test]
    fn test_full_config() {
        let config = parse_config(
            r#"
[db]
path = "/tmp/cv.sqlite"

[chunking]
chunk_size = 500
chunk_overlap = 50

[retrieval]
result_limit = 5
relevance_threshold_ratio = 0.5
max_context_length = 4000

[embedding]
provider = "openai"
model = "text-embedding-3-small"
dims = 1536
"#,
        )
        .unwrap();
        assert_eq!(config.db.path, PathBuf::from("/tmp/cv.sqlite"));
        assert_eq!(config.chunking.chunk_size, 500);
        let core = config.retrieval.to_core().unwrap();
        assert_eq!(core.result_limit(), 5);
        assert_eq!(core.max_context_length(), 4000);
        assert!(config.embedding.is_enabled());
    }

    #[test]
    fn test_rejects_bad_ratio() {
        let err = parse_config(
            "[db]\npath = \"x\"\n[retrieval]\nrelevance_threshold_ratio = 1.5\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("relevance_threshold_ratio"));
    }

    #[test]
    fn test_rejects_overlap_not_smaller_than_size() {
        let err = parse_config("[db]\npath = \"x\"\n[chunking]\nchunk_size = 100\nchunk_overlap = 100\n")
            .unwrap_err();
        assert!(err.to_string().contains("chunk_overlap"));
    }

    #[test]
    fn test_rejects_unknown_provider() {
        let err = parse_config("[db]\npath = \"x\"\n[embedding]\nprovider = \"cohere\"\n").unwrap_err();
        assert!(err.to_string().contains("Unknown embedding provider"));
    }

    #[test]
    fn test_openai_requires_model_and_dims() {
        let err = parse_config("[db]\npath = \"x\"\n[embedding]\nprovider = \"openai\"\n").unwrap_err();
        assert!(err.to_string().contains("embedding.dims"));
    }
}
