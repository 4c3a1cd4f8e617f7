//! Error taxonomy for retrieval and configuration.
//!
//! Store failures ([`RetrievalError`]) are recoverable: the retriever logs
//! them and degrades to an empty context. Configuration errors
//! ([`ConfigError`]) indicate a setup bug and are returned immediately.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RetrievalError {
    /// The similarity index is missing, uninitialized, or holds no chunks.
    #[error("chunk store unavailable: {0}")]
    ChunkStoreUnavailable(String),

    /// Any other failure raised by the store or its embedding backend.
    #[error("chunk store query failed: {0}")]
    Backend(#[from] anyhow::Error),
}

impl RetrievalError {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, RetrievalError::ChunkStoreUnavailable(_))
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Malformed { field: &'static str, reason: String },
}

impl ConfigError {
    pub(crate) fn malformed(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Malformed {
            field,
            reason: reason.into(),
        }
    }
}
