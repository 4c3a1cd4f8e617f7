//! `cvrag stats`: what is indexed, per source tag.

use anyhow::Result;
use sqlx::Row;

use crate::config::Config;
use crate::db;

struct SourceStats {
    source_tag: String,
    words: i64,
    chunk_count: i64,
    embedded_count: i64,
    updated_at: i64,
}

pub async fn run_stats(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;

    let total_docs: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents")
        .fetch_one(&pool)
        .await?;
    let total_chunks: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks")
        .fetch_one(&pool)
        .await?;
    let total_embedded: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunk_vectors")
        .fetch_one(&pool)
        .await?;

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("cvrag database stats");
    println!("====================");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!("  Embedding:   {}", config.embedding.provider);
    println!();
    println!("  Documents:   {}", total_docs);
    println!("  Chunks:      {}", total_chunks);
    println!(
        "  Embedded:    {} / {} ({}%)",
        total_embedded,
        total_chunks,
        if total_chunks > 0 {
            (total_embedded * 100) / total_chunks
        } else {
            0
        }
    );

    let rows = sqlx::query(
        r#"
        SELECT
            d.source_tag,
            d.word_count,
            d.updated_at,
            COUNT(DISTINCT c.id) AS chunk_count,
            COUNT(DISTINCT cv.chunk_id) AS embedded_count
        FROM documents d
        LEFT JOIN chunks c ON c.document_id = d.id
        LEFT JOIN chunk_vectors cv ON cv.chunk_id = c.id
        GROUP BY d.id
        ORDER BY d.source_tag
        "#,
    )
    .fetch_all(&pool)
    .await?;

    let sources: Vec<SourceStats> = rows
        .iter()
        .map(|row| SourceStats {
            source_tag: row.get("source_tag"),
            words: row.get("word_count"),
            chunk_count: row.get("chunk_count"),
            embedded_count: row.get("embedded_count"),
            updated_at: row.get("updated_at"),
        })
        .collect();

    if !sources.is_empty() {
        println!();
        println!("  By source:");
        println!(
            "  {:<24} {:>8} {:>8} {:>10}   {}",
            "SOURCE", "WORDS", "CHUNKS", "EMBEDDED", "UPDATED"
        );
        println!("  {}", "-".repeat(72));
        for s in &sources {
            println!(
                "  {:<24} {:>8} {:>8} {:>10}   {}",
                s.source_tag,
                s.words,
                s.chunk_count,
                s.embedded_count,
                format_ts(s.updated_at)
            );
        }
    }
    println!();

    pool.close().await;
    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

fn format_ts(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0 MB");
    }

    #[test]
    fn test_format_ts() {
        assert_eq!(format_ts(0), "1970-01-01 00:00");
    }
}
