//! Chunk store abstraction.
//!
//! The [`ChunkStore`] trait is the only thing the retrieval pipeline needs
//! from storage: nearest neighbors of a free-text query, best first.
//! Backends decide how similarity is computed (embedding cosine, keyword
//! rank, ...); the retriever only relies on scores being comparable within
//! one result batch.
//!
//! The store is read-only from the retriever's point of view. Population
//! happens upstream, at ingestion time.

pub mod memory;

use async_trait::async_trait;

use crate::error::RetrievalError;
use crate::models::ScoredChunk;

/// A similarity-searchable index of chunks.
#[async_trait]
pub trait ChunkStore: Send + Sync {
    /// Return up to `limit` chunks most similar to `query`, ordered by
    /// descending score.
    ///
    /// An initialized store with nothing relevant returns `Ok(vec![])`.
    /// A store that was never populated returns
    /// [`RetrievalError::ChunkStoreUnavailable`].
    async fn nearest_neighbors(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<ScoredChunk>, RetrievalError>;
}

#[async_trait]
impl<S: ChunkStore + ?Sized> ChunkStore for std::sync::Arc<S> {
    async fn nearest_neighbors(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<ScoredChunk>, RetrievalError> {
        (**self).nearest_neighbors(query, limit).await
    }
}

/// Sort scored chunks best first.
pub fn sort_by_score_desc(chunks: &mut [ScoredChunk]) {
    chunks.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}
