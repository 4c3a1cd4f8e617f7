use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::RetrievalError;
use crate::models::{Chunk, ScoredChunk};
use crate::store::ChunkStore;

/// Build a scored chunk whose id is derived from its content and tag.
pub fn scored(content: &str, source_tag: &str, score: f64) -> ScoredChunk {
    ScoredChunk::new(
        Chunk {
            id: format!("{source_tag}:{content}"),
            content: content.to_string(),
            source_tag: source_tag.to_string(),
            sequence_index: 0,
            hash: String::new(),
        },
        score,
    )
}

enum Mode {
    Fixed(Vec<ScoredChunk>),
    PerQuery(HashMap<String, Vec<ScoredChunk>>),
    Unavailable,
    Broken,
}

/// Scripted [`ChunkStore`] that records every query it receives.
pub struct MockStore {
    mode: Mode,
    calls: Mutex<Vec<(String, usize)>>,
}

impl MockStore {
    /// Returns the same batch for every query.
    pub fn fixed(results: Vec<ScoredChunk>) -> Self {
        Self::with_mode(Mode::Fixed(results))
    }

    /// Returns a batch per query text; unknown queries get no results.
    pub fn per_query(results: Vec<(&str, Vec<ScoredChunk>)>) -> Self {
        Self::with_mode(Mode::PerQuery(
            results
                .into_iter()
                .map(|(q, r)| (q.to_string(), r))
                .collect(),
        ))
    }

    pub fn unavailable() -> Self {
        Self::with_mode(Mode::Unavailable)
    }

    pub fn broken() -> Self {
        Self::with_mode(Mode::Broken)
    }

    fn with_mode(mode: Mode) -> Self {
        Self {
            mode,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// `(query, limit)` pairs in call order.
    pub fn calls(&self) -> Vec<(String, usize)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn queries(&self) -> Vec<String> {
        self.calls().into_iter().map(|(q, _)| q).collect()
    }
}

#[async_trait]
impl ChunkStore for MockStore {
    async fn nearest_neighbors(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<ScoredChunk>, RetrievalError> {
        self.calls.lock().unwrap().push((query.to_string(), limit));
        let mut results = match &self.mode {
            Mode::Fixed(r) => r.clone(),
            Mode::PerQuery(map) => map.get(query).cloned().unwrap_or_default(),
            Mode::Unavailable => {
                return Err(RetrievalError::ChunkStoreUnavailable(
                    "no index loaded".to_string(),
                ))
            }
            Mode::Broken => return Err(anyhow::anyhow!("disk on fire").into()),
        };
        results.truncate(limit);
        Ok(results)
    }
}
