//! In-memory [`ChunkStore`] for tests, demos, and single-session use.
//!
//! Chunks and their vectors live in a `Vec` behind `std::sync::RwLock`.
//! Search is brute-force cosine similarity over every stored vector.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;

use crate::embedding::{cosine_similarity, embed_query, Embedder};
use crate::error::RetrievalError;
use crate::models::{Chunk, ScoredChunk};

use super::{sort_by_score_desc, ChunkStore};

struct StoredChunk {
    chunk: Chunk,
    vector: Vec<f32>,
}

/// In-memory chunk store backed by an [`Embedder`].
pub struct InMemoryChunkStore {
    embedder: Arc<dyn Embedder>,
    chunks: RwLock<Vec<StoredChunk>>,
}

impl InMemoryChunkStore {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            chunks: RwLock::new(Vec::new()),
        }
    }

    /// Embed and store chunks. Returns the number of chunks added.
    pub async fn add_chunks(&self, chunks: Vec<Chunk>) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }
        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let vectors = self.embedder.embed(&texts).await?;
        if vectors.len() != chunks.len() {
            bail!(
                "embedder returned {} vectors for {} chunks",
                vectors.len(),
                chunks.len()
            );
        }

        let mut stored = self
            .chunks
            .write()
            .map_err(|_| anyhow!("chunk store lock poisoned"))?;
        let added = chunks.len();
        stored.extend(
            chunks
                .into_iter()
                .zip(vectors)
                .map(|(chunk, vector)| StoredChunk { chunk, vector }),
        );
        Ok(added)
    }

    pub fn len(&self) -> usize {
        self.chunks.read().map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of stored chunks per source tag.
    pub fn source_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        if let Ok(chunks) = self.chunks.read() {
            for sc in chunks.iter() {
                *counts.entry(sc.chunk.source_tag.clone()).or_insert(0) += 1;
            }
        }
        counts
    }
}

#[async_trait]
impl ChunkStore for InMemoryChunkStore {
    async fn nearest_neighbors(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<ScoredChunk>, RetrievalError> {
        if self.is_empty() {
            return Err(RetrievalError::ChunkStoreUnavailable(
                "in-memory store holds no chunks".to_string(),
            ));
        }

        let query_vec = embed_query(self.embedder.as_ref(), query).await?;

        let stored = self
            .chunks
            .read()
            .map_err(|_| anyhow!("chunk store lock poisoned"))?;
        let mut scored: Vec<ScoredChunk> = stored
            .iter()
            .map(|sc| {
                ScoredChunk::new(
                    sc.chunk.clone(),
                    cosine_similarity(&query_vec, &sc.vector) as f64,
                )
            })
            .collect();
        sort_by_score_desc(&mut scored);
        scored.truncate(limit);
        Ok(scored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::chunk_document;
    use crate::models::SourceDocument;

    /// Bag-of-words embedder: each lowercase word bumps one of 64 buckets.
    struct BucketEmbedder;

    fn bucket(word: &str) -> usize {
        word.bytes().fold(7usize, |h, b| h.wrapping_mul(31).wrapping_add(b as usize)) % 64
    }

    #[async_trait]
    impl Embedder for BucketEmbedder {
        fn model_name(&self) -> &str {
            "bucket-64"
        }
        fn dims(&self) -> usize {
            64
        }
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| {
                    let mut v = vec![0.0f32; 64];
                    for w in t.to_lowercase().split(|c: char| !c.is_alphanumeric()) {
                        if !w.is_empty() {
                            v[bucket(w)] += 1.0;
                        }
                    }
                    v
                })
                .collect())
        }
    }

    fn store() -> InMemoryChunkStore {
        InMemoryChunkStore::new(Arc::new(BucketEmbedder))
    }

    #[tokio::test]
    async fn test_empty_store_is_unavailable() {
        let err = store().nearest_neighbors("rust", 5).await.unwrap_err();
        assert!(err.is_unavailable());
    }

    #[tokio::test]
    async fn test_nearest_neighbors_ranked_and_limited() {
        let s = store();
        let mut chunks = Vec::new();
        for (tag, text) in [
            ("skills_superset", "rust tokio async rust"),
            ("job_description", "hiring a rust engineer"),
            ("experience_superset", "managed a bakery"),
        ] {
            chunks.extend(chunk_document(&SourceDocument::new(tag, text), 1000, 200).unwrap());
        }
        assert_eq!(s.add_chunks(chunks).await.unwrap(), 3);

        let results = s.nearest_neighbors("rust", 2).await.unwrap();
        assert_eq!(results.len(), 2);
        assert!(results[0].score >= results[1].score);
        assert!(results.iter().all(|r| r.content().contains("rust")));
    }

    #[tokio::test]
    async fn test_source_counts() {
        let s = store();
        let doc = SourceDocument::new("job_description", "alpha\n\nbeta");
        let mut chunks = chunk_document(&doc, 6, 0).unwrap();
        chunks.extend(chunk_document(&SourceDocument::new("sample_cv", "gamma"), 1000, 0).unwrap());
        s.add_chunks(chunks).await.unwrap();

        let counts = s.source_counts();
        assert_eq!(counts.get("job_description"), Some(&2));
        assert_eq!(counts.get("sample_cv"), Some(&1));
    }
}
