//! Core data models shared by ingestion and retrieval.
//!
//! A [`SourceDocument`] is split into [`Chunk`]s at ingestion time. Chunks
//! are immutable once created and owned by the chunk store; retrieval only
//! ever sees them paired with a similarity score as [`ScoredChunk`].

use serde::Serialize;

/// Source tag of the target job description.
pub const JOB_DESCRIPTION: &str = "job_description";
/// Source tag of the candidate's full experience history.
pub const EXPERIENCE_SUPERSET: &str = "experience_superset";
/// Source tag of the candidate's full skills inventory.
pub const SKILLS_SUPERSET: &str = "skills_superset";
/// Source tag of a sample CV used as a style reference.
pub const SAMPLE_CV: &str = "sample_cv";
/// Source tag of a condensed experience summary.
pub const EXPERIENCE_SUMMARY: &str = "experience_summary";
/// Generic tag for any superset document.
pub const SUPERSET: &str = "superset";

/// Document text handed to the chunker.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub source_tag: String,
    pub title: Option<String>,
    pub body: String,
}

impl SourceDocument {
    pub fn new(source_tag: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            source_tag: source_tag.into(),
            title: None,
            body: body.into(),
        }
    }
}

/// A unit of ingested text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Chunk {
    /// Chunk UUID.
    pub id: String,
    /// Raw chunk text.
    pub content: String,
    /// Originating document, e.g. `"job_description"`.
    pub source_tag: String,
    /// Position among chunks from the same source.
    pub sequence_index: i64,
    /// SHA-256 of `content`, hex encoded.
    pub hash: String,
}

/// A chunk paired with its similarity score for one query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f64,
}

impl ScoredChunk {
    pub fn new(chunk: Chunk, score: f64) -> Self {
        Self { chunk, score }
    }

    pub fn source_tag(&self) -> &str {
        &self.chunk.source_tag
    }

    pub fn content(&self) -> &str {
        &self.chunk.content
    }
}
