//! Document ingestion: extract → clean → chunk → store → embed.
//!
//! Each `--doc tag=path` replaces whatever was previously stored under that
//! source tag. Embedding happens inline when a provider is configured; a
//! failed embedding call is logged and the document stays keyword-searchable.

use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use std::str::FromStr;

use cvrag_core::chunk::{chunk_document, clean_text};
use cvrag_core::embedding::Embedder;
use cvrag_core::SourceDocument;

use crate::config::Config;
use crate::db;
use crate::embedding::create_embedder;
use crate::extract::extract_file;
use crate::sqlite_store::SqliteChunkStore;

/// A `tag=path` pair from the command line.
#[derive(Debug, Clone, PartialEq)]
pub struct DocSpec {
    pub source_tag: String,
    pub path: PathBuf,
}

impl FromStr for DocSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (tag, path) = s
            .split_once('=')
            .ok_or_else(|| format!("expected <tag>=<path>, got '{}'", s))?;
        let tag = tag.trim();
        let path = path.trim();
        if tag.is_empty() {
            return Err("source tag must not be empty".to_string());
        }
        if path.is_empty() {
            return Err(format!("missing path for source tag '{}'", tag));
        }
        Ok(Self {
            source_tag: tag.to_string(),
            path: PathBuf::from(path),
        })
    }
}

/// Outcome for one ingested document.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentReport {
    pub source_tag: String,
    pub words: usize,
    pub chunks: usize,
    pub embedded: usize,
}

pub async fn run_ingest(config: &Config, docs: &[DocSpec]) -> Result<()> {
    if docs.is_empty() {
        bail!("nothing to ingest; pass at least one --doc <tag>=<path>");
    }

    let pool = db::connect(config).await?;
    let embedder = create_embedder(&config.embedding)?;
    let store = SqliteChunkStore::new(pool, embedder.clone());

    let mut reports = Vec::with_capacity(docs.len());
    for spec in docs {
        let report = ingest_one(config, &store, embedder.as_deref(), spec).await?;
        reports.push(report);
    }

    println!("ingest ok");
    println!("  {:<24} {:>8} {:>8} {:>10}", "SOURCE", "WORDS", "CHUNKS", "EMBEDDED");
    for r in &reports {
        println!(
            "  {:<24} {:>8} {:>8} {:>10}",
            r.source_tag, r.words, r.chunks, r.embedded
        );
    }
    println!(
        "  documents: {}  chunks: {}",
        reports.len(),
        reports.iter().map(|r| r.chunks).sum::<usize>()
    );

    store.pool().close().await;
    Ok(())
}

async fn ingest_one(
    config: &Config,
    store: &SqliteChunkStore,
    embedder: Option<&dyn Embedder>,
    spec: &DocSpec,
) -> Result<DocumentReport> {
    let raw = extract_file(&spec.path)
        .with_context(|| format!("failed to extract '{}'", spec.source_tag))?;

    let mut doc = SourceDocument::new(spec.source_tag.clone(), clean_text(&raw));
    doc.title = spec
        .path
        .file_stem()
        .and_then(|s| s.to_str())
        .map(str::to_string);

    if doc.body.is_empty() {
        tracing::warn!(source_tag = %doc.source_tag, path = %spec.path.display(), "document has no text");
    }

    let chunks = chunk_document(
        &doc,
        config.chunking.chunk_size,
        config.chunking.chunk_overlap,
    )?;

    let doc_id = store
        .upsert_document(&doc, &spec.path.display().to_string())
        .await?;
    store.replace_chunks(&doc_id, &chunks).await?;

    let mut embedded = 0;
    if let Some(embedder) = embedder {
        if !chunks.is_empty() {
            let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
            match embedder.embed(&texts).await {
                Ok(vectors) => {
                    embedded = store
                        .store_vectors(&doc_id, &chunks, &vectors, embedder.model_name())
                        .await?;
                }
                Err(e) => {
                    tracing::warn!(
                        source_tag = %doc.source_tag,
                        error = %e,
                        "embedding failed; chunks remain keyword-searchable"
                    );
                }
            }
        }
    }

    tracing::info!(
        source_tag = %doc.source_tag,
        chunks = chunks.len(),
        embedded,
        "document ingested"
    );

    Ok(DocumentReport {
        source_tag: doc.source_tag,
        words: doc.body.split_whitespace().count(),
        chunks: chunks.len(),
        embedded,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_doc_spec_parse() {
        let spec: DocSpec = "job_description=./jd.pdf".parse().unwrap();
        assert_eq!(spec.source_tag, "job_description");
        assert_eq!(spec.path, PathBuf::from("./jd.pdf"));
    }

    #[test]
    fn test_doc_spec_path_may_contain_equals() {
        let spec: DocSpec = "sample_cv=./a=b.txt".parse().unwrap();
        assert_eq!(spec.path, PathBuf::from("./a=b.txt"));
    }

    #[test]
    fn test_doc_spec_rejects_malformed() {
        assert!("job_description".parse::<DocSpec>().is_err());
        assert!("=./jd.txt".parse::<DocSpec>().is_err());
        assert!("job_description=".parse::<DocSpec>().is_err());
    }
}
