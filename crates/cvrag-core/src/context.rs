//! Task-level context bundles for the generation layer.
//!
//! [`ContextBuilder`] composes several retriever calls into the labeled
//! strings that CV and cover-letter prompts consume. It adds no filtering
//! of its own; budget and deduplication are applied per bundle section by
//! the [`Retriever`].

use serde::Serialize;

use crate::retriever::{AssembledContext, Retriever};
use crate::store::ChunkStore;

pub const CV_JOB_HEADER: &str = "JOB DESCRIPTION ANALYSIS:";
pub const CV_CANDIDATE_HEADER: &str = "CANDIDATE EXPERIENCE & SKILLS SUPERSET:";
pub const COVER_LETTER_JOB_HEADER: &str = "TARGET JOB & COMPANY:";
pub const COVER_LETTER_CANDIDATE_HEADER: &str = "RELEVANT CANDIDATE BACKGROUND:";

/// Second cover-letter query when no company focus is given.
pub const DEFAULT_COMPANY_FOCUS: &str = "company culture values mission";
/// Skill focus used for the cover-letter background section.
pub const COVER_LETTER_SKILL_FOCUS: &str = "relevant projects achievements experience";

const COVER_LETTER_REQUIREMENTS_QUERY: &str = "job requirements responsibilities";
const COVER_LETTER_QUALIFICATIONS_QUERY: &str = "qualifications experience needed";

/// Line prefix that marks a rendered chunk block.
const SOURCE_MARKER: &str = "(Source:";

/// Light statistics over an assembled context string.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ContextSummary {
    pub total_chars: usize,
    pub total_words: usize,
    pub paragraph_count: usize,
    pub source_count: usize,
}

/// Builds named context bundles from a [`Retriever`].
pub struct ContextBuilder<S> {
    retriever: Retriever<S>,
}

impl<S: ChunkStore> ContextBuilder<S> {
    pub fn new(retriever: Retriever<S>) -> Self {
        Self { retriever }
    }

    /// The underlying retriever, for callers that need a custom query set
    /// through [`Retriever::job_description_context`] or
    /// [`Retriever::candidate_background_context`].
    pub fn retriever(&self) -> &Retriever<S> {
        &self.retriever
    }

    /// Job description analysis plus the candidate's full background.
    pub async fn build_for_cv_generation(&self) -> String {
        let jd = self.retriever.job_description_context(None).await;
        let background = self.retriever.candidate_background_context(None).await;
        labeled(CV_JOB_HEADER, &jd, CV_CANDIDATE_HEADER, &background)
    }

    /// Job and company context plus the candidate background most relevant
    /// to a cover letter.
    pub async fn build_for_cover_letter(&self, company_focus: Option<&str>) -> String {
        let focus = company_focus
            .filter(|f| !f.trim().is_empty())
            .unwrap_or(DEFAULT_COMPANY_FOCUS);
        let queries = [
            COVER_LETTER_REQUIREMENTS_QUERY,
            focus,
            COVER_LETTER_QUALIFICATIONS_QUERY,
        ];
        let jd = self.retriever.job_description_context(Some(&queries)).await;
        let background = self
            .retriever
            .candidate_background_context(Some(COVER_LETTER_SKILL_FOCUS))
            .await;
        labeled(
            COVER_LETTER_JOB_HEADER,
            &jd,
            COVER_LETTER_CANDIDATE_HEADER,
            &background,
        )
    }

    pub fn summarize(&self, context_text: &str) -> ContextSummary {
        summarize(context_text)
    }
}

fn labeled(
    first_header: &str,
    first: &AssembledContext,
    second_header: &str,
    second: &AssembledContext,
) -> String {
    format!(
        "{}\n{}\n\n{}\n{}",
        first_header, first.context_text, second_header, second.context_text
    )
    .trim()
    .to_string()
}

/// Count characters, words, blank-line separated paragraphs and rendered
/// source blocks in a context string.
pub fn summarize(context_text: &str) -> ContextSummary {
    ContextSummary {
        total_chars: context_text.chars().count(),
        total_words: context_text.split_whitespace().count(),
        paragraph_count: context_text
            .split("\n\n")
            .filter(|p| !p.trim().is_empty())
            .count(),
        source_count: context_text
            .split('\n')
            .filter(|line| line.starts_with(SOURCE_MARKER))
            .count(),
    }
}
