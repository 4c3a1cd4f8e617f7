//! SQLite-backed [`ChunkStore`].
//!
//! Ranking depends on whether an embedder is configured:
//!
//! - **Vector**: the query is embedded and compared by cosine similarity
//!   against every stored vector of the same model.
//! - **Keyword**: FTS5 BM25 over an OR of the quoted query terms. FTS5
//!   ranks are negative (lower is better), so the score is `-rank`.
//!
//! When an embedder is configured but no vectors exist yet (for example
//! every inline embedding failed during ingest), keyword ranking is used.

use anyhow::Result;
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::sync::Arc;
use uuid::Uuid;

use cvrag_core::embedding::{blob_to_vec, cosine_similarity, embed_query, vec_to_blob, Embedder};
use cvrag_core::store::{sort_by_score_desc, ChunkStore};
use cvrag_core::{Chunk, RetrievalError, ScoredChunk, SourceDocument};

pub struct SqliteChunkStore {
    pool: SqlitePool,
    embedder: Option<Arc<dyn Embedder>>,
}

impl SqliteChunkStore {
    pub fn new(pool: SqlitePool, embedder: Option<Arc<dyn Embedder>>) -> Self {
        Self { pool, embedder }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Insert or replace the document stored under `doc.source_tag`.
    /// Returns the document id, which is stable across re-ingests.
    pub async fn upsert_document(&self, doc: &SourceDocument, source_path: &str) -> Result<String> {
        let dedup_hash = format!("{:x}", Sha256::digest(doc.body.as_bytes()));
        let word_count = doc.body.split_whitespace().count() as i64;
        let now = chrono::Utc::now().timestamp();

        let id: String = sqlx::query_scalar(
            r#"
            INSERT INTO documents (id, source_tag, title, source_path, body, dedup_hash, word_count, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(source_tag) DO UPDATE SET
                title = excluded.title,
                source_path = excluded.source_path,
                body = excluded.body,
                dedup_hash = excluded.dedup_hash,
                word_count = excluded.word_count,
                updated_at = excluded.updated_at
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&doc.source_tag)
        .bind(&doc.title)
        .bind(source_path)
        .bind(&doc.body)
        .bind(&dedup_hash)
        .bind(word_count)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    /// Replace every chunk (and vector) of a document in one transaction.
    pub async fn replace_chunks(&self, doc_id: &str, chunks: &[Chunk]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM chunk_vectors WHERE document_id = ?")
            .bind(doc_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM chunks_fts WHERE document_id = ?")
            .bind(doc_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM chunks WHERE document_id = ?")
            .bind(doc_id)
            .execute(&mut *tx)
            .await?;

        for chunk in chunks {
            sqlx::query(
                "INSERT INTO chunks (id, document_id, source_tag, sequence_index, content, hash) VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(&chunk.id)
            .bind(doc_id)
            .bind(&chunk.source_tag)
            .bind(chunk.sequence_index)
            .bind(&chunk.content)
            .bind(&chunk.hash)
            .execute(&mut *tx)
            .await?;

            sqlx::query("INSERT INTO chunks_fts (chunk_id, document_id, content) VALUES (?, ?, ?)")
                .bind(&chunk.id)
                .bind(doc_id)
                .bind(&chunk.content)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Store one vector per chunk, pairing them by position.
    pub async fn store_vectors(
        &self,
        doc_id: &str,
        chunks: &[Chunk],
        vectors: &[Vec<f32>],
        model: &str,
    ) -> Result<usize> {
        if chunks.len() != vectors.len() {
            anyhow::bail!(
                "embedding count mismatch: {} chunks, {} vectors",
                chunks.len(),
                vectors.len()
            );
        }

        let mut tx = self.pool.begin().await?;
        for (chunk, vector) in chunks.iter().zip(vectors) {
            sqlx::query(
                r#"
                INSERT INTO chunk_vectors (chunk_id, document_id, model, dims, embedding)
                VALUES (?, ?, ?, ?, ?)
                ON CONFLICT(chunk_id) DO UPDATE SET
                    document_id = excluded.document_id,
                    model = excluded.model,
                    dims = excluded.dims,
                    embedding = excluded.embedding
                "#,
            )
            .bind(&chunk.id)
            .bind(doc_id)
            .bind(model)
            .bind(vector.len() as i64)
            .bind(vec_to_blob(vector))
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(vectors.len())
    }

    async fn ensure_available(&self) -> Result<(), RetrievalError> {
        let has_schema: bool = sqlx::query_scalar(
            "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='chunks'",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(backend)?;
        if !has_schema {
            return Err(RetrievalError::ChunkStoreUnavailable(
                "database is not initialized; run `cvrag init`".to_string(),
            ));
        }

        let chunk_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks")
            .fetch_one(&self.pool)
            .await
            .map_err(backend)?;
        if chunk_count == 0 {
            return Err(RetrievalError::ChunkStoreUnavailable(
                "no documents have been ingested".to_string(),
            ));
        }
        Ok(())
    }

    async fn vector_search(
        &self,
        embedder: &dyn Embedder,
        query: &str,
        limit: usize,
    ) -> Result<Option<Vec<ScoredChunk>>, RetrievalError> {
        let rows = sqlx::query(
            r#"
            SELECT c.id, c.content, c.source_tag, c.sequence_index, c.hash, cv.embedding
            FROM chunk_vectors cv
            JOIN chunks c ON c.id = cv.chunk_id
            WHERE cv.model = ?
            "#,
        )
        .bind(embedder.model_name())
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        if rows.is_empty() {
            return Ok(None);
        }

        let query_vec = embed_query(embedder, query).await?;
        let mut scored: Vec<ScoredChunk> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let similarity = cosine_similarity(&query_vec, &blob_to_vec(&blob));
                ScoredChunk::new(chunk_from_row(row), similarity as f64)
            })
            .collect();
        sort_by_score_desc(&mut scored);
        scored.truncate(limit);
        Ok(Some(scored))
    }

    async fn keyword_search(&self, query: &str, limit: usize) -> Result<Vec<ScoredChunk>, RetrievalError> {
        let Some(match_expr) = fts_match_expression(query) else {
            return Ok(Vec::new());
        };

        let rows = sqlx::query(
            r#"
            SELECT c.id, c.content, c.source_tag, c.sequence_index, c.hash, chunks_fts.rank AS rank
            FROM chunks_fts
            JOIN chunks c ON c.id = chunks_fts.chunk_id
            WHERE chunks_fts MATCH ?
            ORDER BY chunks_fts.rank
            LIMIT ?
            "#,
        )
        .bind(&match_expr)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        Ok(rows
            .iter()
            .map(|row| {
                let rank: f64 = row.get("rank");
                ScoredChunk::new(chunk_from_row(row), -rank)
            })
            .collect())
    }
}

#[async_trait]
impl ChunkStore for SqliteChunkStore {
    async fn nearest_neighbors(&self, query: &str, limit: usize) -> Result<Vec<ScoredChunk>, RetrievalError> {
        self.ensure_available().await?;

        if let Some(embedder) = &self.embedder {
            if let Some(results) = self.vector_search(embedder.as_ref(), query, limit).await? {
                return Ok(results);
            }
            tracing::warn!(
                model = embedder.model_name(),
                "no stored vectors for model; falling back to keyword ranking"
            );
        }
        self.keyword_search(query, limit).await
    }
}

fn backend(e: sqlx::Error) -> RetrievalError {
    RetrievalError::Backend(e.into())
}

fn chunk_from_row(row: &SqliteRow) -> Chunk {
    Chunk {
        id: row.get("id"),
        content: row.get("content"),
        source_tag: row.get("source_tag"),
        sequence_index: row.get("sequence_index"),
        hash: row.get("hash"),
    }
}

/// Turn free text into an FTS5 expression: every alphanumeric term quoted
/// and OR-ed together. Returns `None` when the query has no terms.
pub fn fts_match_expression(query: &str) -> Option<String> {
    let terms: Vec<String> = query
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| format!("\"{}\"", t.to_lowercase()))
        .collect();
    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" OR "))
    }
}
