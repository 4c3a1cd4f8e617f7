//! Retrieval and context commands: `retrieve`, `context`, `summarize`.
//!
//! Context goes to stdout unchanged so it can be piped into a prompt.
//! Diagnostics (empty-context warnings, statistics) go to stderr unless
//! `--json` or `--summary` asks for them on stdout.

use anyhow::{Context, Result};
use std::io::Read;
use std::path::Path;

use cvrag_core::{summarize, AssembledContext, ContextBuilder, ContextSummary, Retriever, Section};

use crate::config::Config;
use crate::db;
use crate::embedding::create_embedder;
use crate::sqlite_store::SqliteChunkStore;

/// Which context bundle `cvrag context` should build.
#[derive(Debug, Clone, PartialEq)]
pub enum ContextKind {
    Cv,
    CoverLetter { company: Option<String> },
    Section(Section),
    JobDescription { queries: Vec<String> },
    Background { skill_focus: Option<String> },
}

/// Wire the configured database and embedder into a retriever.
pub async fn open_retriever(config: &Config) -> Result<Retriever<SqliteChunkStore>> {
    let pool = db::connect(config).await?;
    let embedder = create_embedder(&config.embedding)?;
    let retrieval = config.retrieval.to_core()?;
    Ok(Retriever::new(SqliteChunkStore::new(pool, embedder), retrieval))
}

pub async fn run_retrieve(config: &Config, query: &str, sources: &[String], json: bool) -> Result<()> {
    let retriever = open_retriever(config).await?;
    let tags: Vec<&str> = sources.iter().map(String::as_str).collect();
    let tags = (!tags.is_empty()).then_some(tags.as_slice());

    let assembled = retriever.retrieve(query, tags).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&assembled)?);
    } else {
        warn_if_empty(&assembled.context_text);
        if !assembled.is_empty() {
            println!("{}", assembled.context_text);
        }
        print_retrieval_stats(&assembled);
    }

    retriever.store().pool().close().await;
    Ok(())
}

pub async fn run_context(config: &Config, kind: &ContextKind, with_summary: bool) -> Result<()> {
    let builder = ContextBuilder::new(open_retriever(config).await?);
    let text = build_context(&builder, kind).await;

    warn_if_empty(&text);
    println!("{}", text);
    if with_summary {
        print_summary(&builder.summarize(&text));
    }

    builder.retriever().store().pool().close().await;
    Ok(())
}

async fn build_context(builder: &ContextBuilder<SqliteChunkStore>, kind: &ContextKind) -> String {
    let retriever = builder.retriever();
    match kind {
        ContextKind::Cv => builder.build_for_cv_generation().await,
        ContextKind::CoverLetter { company } => {
            builder.build_for_cover_letter(company.as_deref()).await
        }
        ContextKind::Section(section) => retriever.targeted_context(*section).await.context_text,
        ContextKind::JobDescription { queries } => {
            let queries: Vec<&str> = queries.iter().map(String::as_str).collect();
            let queries = (!queries.is_empty()).then_some(queries.as_slice());
            retriever.job_description_context(queries).await.context_text
        }
        ContextKind::Background { skill_focus } => {
            retriever
                .candidate_background_context(skill_focus.as_deref())
                .await
                .context_text
        }
    }
}

/// Summarize a file, or stdin when no path is given.
pub fn run_summarize(path: Option<&Path>, json: bool) -> Result<()> {
    let text = match path {
        Some(p) => std::fs::read_to_string(p)
            .with_context(|| format!("Failed to read {}", p.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read stdin")?;
            buf
        }
    };

    let summary = summarize(&text);
    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }
    Ok(())
}

/// Bundles always carry their headers, so "empty" means no source block.
fn warn_if_empty(text: &str) {
    if summarize(text).source_count == 0 {
        eprintln!("warning: no relevant context found. Ingest documents with `cvrag ingest` first.");
    }
}

fn print_retrieval_stats(assembled: &AssembledContext) {
    eprintln!();
    eprintln!(
        "retrieved: {}  after filtering: {}  selected: {}",
        assembled.total_retrieved,
        assembled.after_filtering,
        assembled.selected_chunks.len()
    );
    for (tag, count) in &assembled.source_distribution {
        eprintln!("  {:<24} {}", tag, count);
    }
}

fn print_summary(summary: &ContextSummary) {
    println!();
    println!("--- summary ---");
    println!("  characters:  {}", summary.total_chars);
    println!("  words:       {}", summary.total_words);
    println!("  paragraphs:  {}", summary.paragraph_count);
    println!("  sources:     {}", summary.source_count);
}
