//! Retrieval pipeline: query → filtered, deduplicated, length-bounded context.
//!
//! The retriever operates entirely through the [`ChunkStore`] trait. It
//! never writes to the store and keeps all per-call state local, so one
//! retriever can serve concurrent callers.
//!
//! # Pipeline
//!
//! 1. Fetch `result_limit` nearest neighbors for the query.
//! 2. Keep chunks whose source tag contains any requested tag
//!    (case-insensitive substring match).
//! 3. Drop chunks scoring below `relevance_threshold_ratio × max_score`,
//!    where `max_score` is taken over the source-filtered batch.
//! 4. Drop chunks whose first 100 characters repeat an earlier chunk's.
//! 5. Render `(Source: tag)\ncontent\n` blocks joined by `\n---\n` until
//!    `max_context_length` characters would be exceeded.
//!
//! Store failures never escape [`Retriever::retrieve`]: they are logged and
//! an empty [`AssembledContext`] is returned, so generation can proceed
//! with less grounding instead of failing outright.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::{ConfigError, RetrievalError};
use crate::models::{
    ScoredChunk, EXPERIENCE_SUMMARY, EXPERIENCE_SUPERSET, JOB_DESCRIPTION, SKILLS_SUPERSET,
    SUPERSET,
};
use crate::store::ChunkStore;

pub const DEFAULT_RESULT_LIMIT: usize = 10;
pub const DEFAULT_RELEVANCE_THRESHOLD_RATIO: f64 = 0.7;
pub const DEFAULT_MAX_CONTEXT_LENGTH: usize = 8000;

/// Number of leading characters that identify a chunk for deduplication.
pub const FINGERPRINT_CHARS: usize = 100;
/// Appended to a first chunk that had to be cut to fit the budget.
pub const TRUNCATION_MARKER: &str = "...[truncated]";
/// Placed between rendered chunk blocks.
pub const CHUNK_SEPARATOR: &str = "\n---\n";
/// Characters kept free when truncating an oversized first chunk.
const TRUNCATION_HEADROOM: usize = 100;

/// Job-description queries used when the caller supplies none.
pub const JOB_DESCRIPTION_QUERIES: [&str; 4] = [
    "job requirements qualifications must have",
    "responsibilities duties role expectations",
    "skills experience needed preferred",
    "company culture values team environment",
];
pub const JOB_DESCRIPTION_TAGS: [&str; 1] = [JOB_DESCRIPTION];

/// First background query when no skill focus is given.
pub const DEFAULT_SKILL_FOCUS: &str = "technical skills experience achievements";
pub const BACKGROUND_QUERIES: [&str; 2] = [
    "projects accomplishments certifications",
    "leadership management experience results",
];
pub const BACKGROUND_TAGS: [&str; 4] = [
    EXPERIENCE_SUPERSET,
    SKILLS_SUPERSET,
    SUPERSET,
    EXPERIENCE_SUMMARY,
];

/// Retrieval tuning parameters.
///
/// Constructed through [`RetrievalConfig::new`], which rejects values
/// outside their valid range instead of clamping them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RetrievalConfig {
    result_limit: usize,
    relevance_threshold_ratio: f64,
    max_context_length: usize,
}

impl RetrievalConfig {
    pub fn new(
        result_limit: usize,
        relevance_threshold_ratio: f64,
        max_context_length: usize,
    ) -> Result<Self, ConfigError> {
        let config = Self {
            result_limit,
            relevance_threshold_ratio,
            max_context_length,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.result_limit == 0 {
            return Err(ConfigError::malformed("result_limit", "must be > 0"));
        }
        if !(0.0..=1.0).contains(&self.relevance_threshold_ratio) {
            return Err(ConfigError::malformed(
                "relevance_threshold_ratio",
                format!("must be in [0.0, 1.0], got {}", self.relevance_threshold_ratio),
            ));
        }
        if self.max_context_length == 0 {
            return Err(ConfigError::malformed("max_context_length", "must be > 0"));
        }
        Ok(())
    }

    pub fn result_limit(&self) -> usize {
        self.result_limit
    }

    pub fn relevance_threshold_ratio(&self) -> f64 {
        self.relevance_threshold_ratio
    }

    pub fn max_context_length(&self) -> usize {
        self.max_context_length
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            result_limit: DEFAULT_RESULT_LIMIT,
            relevance_threshold_ratio: DEFAULT_RELEVANCE_THRESHOLD_RATIO,
            max_context_length: DEFAULT_MAX_CONTEXT_LENGTH,
        }
    }
}

/// Output of a retrieval call.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AssembledContext {
    /// Rendered chunk blocks, within the character budget.
    pub context_text: String,
    /// Chunks that contributed to `context_text`, in selection order.
    pub selected_chunks: Vec<ScoredChunk>,
    /// Count of `selected_chunks` per source tag.
    pub source_distribution: BTreeMap<String, usize>,
    /// Neighbors returned by the store, summed over all queries.
    pub total_retrieved: usize,
    /// Chunks left after source and relevance filtering, summed over all queries.
    pub after_filtering: usize,
    /// Queries issued to the store.
    pub queries_used: Vec<String>,
}

impl AssembledContext {
    /// The degraded result used when the store cannot answer.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.context_text.is_empty()
    }

    fn from_candidates(
        candidates: Vec<ScoredChunk>,
        max_context_length: usize,
        total_retrieved: usize,
        after_filtering: usize,
        queries_used: Vec<String>,
    ) -> Self {
        let (context_text, selected_chunks) = assemble_context(&candidates, max_context_length);
        let source_distribution = source_distribution(&selected_chunks);
        Self {
            context_text,
            selected_chunks,
            source_distribution,
            total_retrieved,
            after_filtering,
            queries_used,
        }
    }
}

/// Candidates for a single query after steps 1–4 of the pipeline.
struct Candidates {
    chunks: Vec<ScoredChunk>,
    total_retrieved: usize,
    after_filtering: usize,
}

/// CV sections with a predefined query set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    CareerSummary,
    Experience,
    Skills,
    CoverLetter,
}

impl Section {
    pub fn queries(&self) -> [&'static str; 3] {
        match self {
            Section::CareerSummary => [
                "professional summary career objective",
                "years experience achievements accomplishments",
                "leadership management skills expertise",
            ],
            Section::Experience => [
                "work experience employment history",
                "job responsibilities achievements results",
                "projects accomplishments impact metrics",
            ],
            Section::Skills => [
                "technical skills competencies",
                "software tools technologies",
                "certifications qualifications expertise",
            ],
            Section::CoverLetter => [
                "job requirements qualifications",
                "company culture values mission",
                "relevant experience achievements match",
            ],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Section::CareerSummary => "career_summary",
            Section::Experience => "experience",
            Section::Skills => "skills",
            Section::CoverLetter => "cover_letter",
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Section {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "career_summary" => Ok(Section::CareerSummary),
            "experience" => Ok(Section::Experience),
            "skills" => Ok(Section::Skills),
            "cover_letter" => Ok(Section::CoverLetter),
            other => Err(ConfigError::malformed(
                "section",
                format!(
                    "unknown section '{}'; expected career_summary, experience, skills or cover_letter",
                    other
                ),
            )),
        }
    }
}

/// Turns queries into [`AssembledContext`]s against a [`ChunkStore`].
pub struct Retriever<S> {
    store: S,
    config: RetrievalConfig,
}

impl<S: ChunkStore> Retriever<S> {
    pub fn new(store: S, config: RetrievalConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Retrieve context for one query, degrading to an empty context if the
    /// store fails.
    pub async fn retrieve(&self, query: &str, source_tags: Option<&[&str]>) -> AssembledContext {
        match self.try_retrieve(query, source_tags).await {
            Ok(ctx) => ctx,
            Err(e) => {
                log_store_failure(&e, query);
                AssembledContext::empty()
            }
        }
    }

    /// Like [`retrieve`](Self::retrieve) but surfaces store failures.
    pub async fn try_retrieve(
        &self,
        query: &str,
        source_tags: Option<&[&str]>,
    ) -> Result<AssembledContext, RetrievalError> {
        let candidates = self.candidates(query, source_tags).await?;
        let ctx = AssembledContext::from_candidates(
            candidates.chunks,
            self.config.max_context_length,
            candidates.total_retrieved,
            candidates.after_filtering,
            vec![query.to_string()],
        );
        tracing::debug!(
            query,
            total_retrieved = ctx.total_retrieved,
            after_filtering = ctx.after_filtering,
            selected = ctx.selected_chunks.len(),
            context_chars = ctx.context_text.chars().count(),
            "retrieved context"
        );
        Ok(ctx)
    }

    /// Fuse several queries into one context.
    ///
    /// Each query runs steps 1–4 independently (tags fixed across queries);
    /// the survivors are concatenated in query order, deduplicated again
    /// across the whole set, and assembled under a single global budget.
    /// A query whose store call fails contributes nothing.
    pub async fn retrieve_multi(
        &self,
        queries: &[&str],
        source_tags: Option<&[&str]>,
    ) -> AssembledContext {
        let mut combined = Vec::new();
        let mut total_retrieved = 0;
        let mut after_filtering = 0;
        let mut queries_used = Vec::with_capacity(queries.len());

        for &query in queries {
            if query.trim().is_empty() {
                continue;
            }
            queries_used.push(query.to_string());
            match self.candidates(query, source_tags).await {
                Ok(c) => {
                    total_retrieved += c.total_retrieved;
                    after_filtering += c.after_filtering;
                    combined.extend(c.chunks);
                }
                Err(e) => log_store_failure(&e, query),
            }
        }

        let unique = ensure_diversity(combined);
        let ctx = AssembledContext::from_candidates(
            unique,
            self.config.max_context_length,
            total_retrieved,
            after_filtering,
            queries_used,
        );
        tracing::debug!(
            queries = ctx.queries_used.len(),
            selected = ctx.selected_chunks.len(),
            context_chars = ctx.context_text.chars().count(),
            "fused multi-query context"
        );
        ctx
    }

    /// Context drawn from the job description only.
    ///
    /// `queries` overrides [`JOB_DESCRIPTION_QUERIES`].
    pub async fn job_description_context(&self, queries: Option<&[&str]>) -> AssembledContext {
        let queries = queries.unwrap_or(&JOB_DESCRIPTION_QUERIES);
        self.retrieve_multi(queries, Some(&JOB_DESCRIPTION_TAGS))
            .await
    }

    /// Context drawn from the candidate's experience and skills documents.
    ///
    /// `skill_focus` replaces [`DEFAULT_SKILL_FOCUS`] as the first query.
    pub async fn candidate_background_context(&self, skill_focus: Option<&str>) -> AssembledContext {
        let first = skill_focus
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(DEFAULT_SKILL_FOCUS);
        let queries = [first, BACKGROUND_QUERIES[0], BACKGROUND_QUERIES[1]];
        self.retrieve_multi(&queries, Some(&BACKGROUND_TAGS)).await
    }

    /// Context for a named CV section, searched across every source.
    pub async fn targeted_context(&self, section: Section) -> AssembledContext {
        self.retrieve_multi(&section.queries(), None).await
    }

    async fn candidates(
        &self,
        query: &str,
        source_tags: Option<&[&str]>,
    ) -> Result<Candidates, RetrievalError> {
        let results = self
            .store
            .nearest_neighbors(query, self.config.result_limit)
            .await?;
        let total_retrieved = results.len();

        let filtered = filter_by_source_tags(results, source_tags);
        let relevant = filter_by_relevance(
            filtered,
            self.config.relevance_threshold_ratio,
            self.config.result_limit,
        );
        let after_filtering = relevant.len();

        Ok(Candidates {
            chunks: ensure_diversity(relevant),
            total_retrieved,
            after_filtering,
        })
    }
}

fn log_store_failure(err: &RetrievalError, query: &str) {
    match err {
        RetrievalError::ChunkStoreUnavailable(_) => {
            tracing::warn!(error = %err, query, "chunk store unavailable, using empty context")
        }
        RetrievalError::Backend(_) => {
            tracing::error!(error = %err, query, "retrieval failed, using empty context")
        }
    }
}

/// Keep chunks whose source tag case-insensitively contains any of `tags`.
///
/// `None` or an empty tag list keeps everything.
pub fn filter_by_source_tags(
    chunks: Vec<ScoredChunk>,
    tags: Option<&[&str]>,
) -> Vec<ScoredChunk> {
    let tags: Vec<String> = match tags {
        Some(t) if !t.is_empty() => t.iter().map(|t| t.to_lowercase()).collect(),
        _ => return chunks,
    };
    chunks
        .into_iter()
        .filter(|sc| {
            let source = sc.source_tag().to_lowercase();
            tags.iter().any(|t| source.contains(t.as_str()))
        })
        .collect()
}

/// Drop chunks scoring below `ratio × max_score` and cap at `limit`.
///
/// `max_score` is computed over the batch as given, so a source-filtered
/// batch is judged against its own best match.
pub fn filter_by_relevance(chunks: Vec<ScoredChunk>, ratio: f64, limit: usize) -> Vec<ScoredChunk> {
    let Some(max_score) = chunks.iter().map(|sc| sc.score).reduce(f64::max) else {
        return chunks;
    };
    let threshold = max_score * ratio;
    chunks
        .into_iter()
        .filter(|sc| sc.score >= threshold)
        .take(limit)
        .collect()
}

/// Keep the first chunk for each distinct leading-text fingerprint.
///
/// Only the first [`FINGERPRINT_CHARS`] characters are compared, so chunks
/// that share a long common prefix collapse into one.
pub fn ensure_diversity(chunks: Vec<ScoredChunk>) -> Vec<ScoredChunk> {
    let mut seen: HashSet<[u8; 32]> = HashSet::with_capacity(chunks.len());
    chunks
        .into_iter()
        .filter(|sc| seen.insert(fingerprint(sc.content())))
        .collect()
}

fn fingerprint(content: &str) -> [u8; 32] {
    let prefix: String = content.chars().take(FINGERPRINT_CHARS).collect();
    Sha256::digest(prefix.as_bytes()).into()
}

/// Render chunks into a context string of at most `max_length` characters
/// (plus [`TRUNCATION_MARKER`] when the first chunk alone is too long).
///
/// Separators count against the budget. Assembly stops at the first block
/// that does not fit. Returns the text and the chunks it contains.
pub fn assemble_context(chunks: &[ScoredChunk], max_length: usize) -> (String, Vec<ScoredChunk>) {
    let sep_len = CHUNK_SEPARATOR.chars().count();
    let mut parts: Vec<String> = Vec::new();
    let mut selected = Vec::new();
    let mut used = 0usize;

    for sc in chunks {
        let block = format!("(Source: {})\n{}\n", sc.source_tag(), sc.content());
        let block_len = block.chars().count();
        let joiner = if parts.is_empty() { 0 } else { sep_len };

        if used + joiner + block_len > max_length {
            if parts.is_empty() {
                let keep = max_length.saturating_sub(TRUNCATION_HEADROOM);
                let mut truncated: String = block.chars().take(keep).collect();
                truncated.push_str(TRUNCATION_MARKER);
                parts.push(truncated);
                selected.push(sc.clone());
            }
            break;
        }

        used += joiner + block_len;
        parts.push(block);
        selected.push(sc.clone());
    }

    (parts.join(CHUNK_SEPARATOR), selected)
}

/// Count chunks per source tag.
pub fn source_distribution(chunks: &[ScoredChunk]) -> BTreeMap<String, usize> {
    let mut distribution = BTreeMap::new();
    for sc in chunks {
        *distribution.entry(sc.source_tag().to_string()).or_insert(0) += 1;
    }
    distribution
}
