//! # cvrag core
//!
//! Runtime-free logic for cvrag: the chunk model, text chunking, the chunk
//! store abstraction, and the retrieval / context-assembly pipeline that
//! turns ingested job-description and candidate documents into bounded
//! context strings for generation prompts.
//!
//! This crate contains no tokio, sqlx, or filesystem I/O. Storage backends
//! and embedding providers plug in through the [`store::ChunkStore`] and
//! [`embedding::Embedder`] traits.
//!
//! ```text
//! query ──▶ Retriever ──▶ ChunkStore::nearest_neighbors
//!              │ source filter → relevance filter → diversity → budget
//!              ▼
//!       AssembledContext ──▶ ContextBuilder ──▶ prompt context string
//! ```

pub mod chunk;
pub mod context;
pub mod embedding;
pub mod error;
pub mod models;
pub mod retriever;
pub mod store;

pub use context::{summarize, ContextBuilder, ContextSummary};
pub use error::{ConfigError, RetrievalError};
pub use models::{Chunk, ScoredChunk, SourceDocument};
pub use retriever::{AssembledContext, RetrievalConfig, Retriever, Section};
pub use store::ChunkStore;

#[cfg(test)]
pub mod test_util;
