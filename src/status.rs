//! Index overview.
//!
//! A quick summary of what's indexed: document and chunk counts, the
//! embedding model signature, per-format breakdown, database size, and
//! the most recent ingest time. Gives confidence that ingest runs are
//! doing what they should.

use anyhow::Result;
use sqlx::Row;

use crate::config::Config;
use crate::db;

pub async fn run_status(config: &Config) -> Result<()> {
    let pool = db::connect(&config.index.path).await?;

    let total_docs: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM manifest")
        .fetch_one(&pool)
        .await?;
    let total_chunks: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM entries")
        .fetch_one(&pool)
        .await?;

    let signature = sqlx::query("SELECT model, dims FROM entries LIMIT 1")
        .fetch_optional(&pool)
        .await?;
    let last_ingest: Option<i64> = sqlx::query_scalar("SELECT MAX(ingested_at) FROM manifest")
        .fetch_one(&pool)
        .await?;

    let db_size = std::fs::metadata(&config.index.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("Quarry — Index Status");
    println!("=====================");
    println!();
    println!("  Database:    {}", config.index.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!();
    println!("  Documents:   {}", total_docs);
    println!("  Chunks:      {}", total_chunks);
    match signature {
        Some(row) => {
            let model: String = row.get("model");
            let dims: i64 = row.get("dims");
            println!("  Model:       {} ({}d)", model, dims);
        }
        None => println!("  Model:       (empty index)"),
    }
    match last_ingest {
        Some(ts) => println!("  Last ingest: {}", format_ts_relative(ts)),
        None => println!("  Last ingest: never"),
    }

    // Per-format breakdown
    let format_rows = sqlx::query(
        r#"
        SELECT
            m.mime_type,
            COUNT(DISTINCT m.source_id) AS doc_count,
            COUNT(e.chunk_id) AS chunk_count
        FROM manifest m
        LEFT JOIN entries e ON e.source_id = m.source_id
        GROUP BY m.mime_type
        ORDER BY doc_count DESC
        "#,
    )
    .fetch_all(&pool)
    .await?;

    if !format_rows.is_empty() {
        println!();
        println!("  By format:");
        println!("  {:<56} {:>6} {:>8}", "MIME TYPE", "DOCS", "CHUNKS");
        println!("  {}", "-".repeat(72));
        for row in &format_rows {
            let mime: String = row.get("mime_type");
            let docs: i64 = row.get("doc_count");
            let chunks: i64 = row.get("chunk_count");
            println!("  {:<56} {:>6} {:>8}", mime, docs, chunks);
        }
    }

    println!();

    pool.close().await;
    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

/// Format a Unix timestamp as a relative time string (e.g. "3 hours ago").
fn format_ts_relative(ts: i64) -> String {
    let now = chrono::Utc::now().timestamp();
    let delta = now - ts;

    if delta < 0 {
        return format_ts_iso(ts);
    }

    if delta < 60 {
        "just now".to_string()
    } else if delta < 3600 {
        let mins = delta / 60;
        format!("{} min{} ago", mins, if mins == 1 { "" } else { "s" })
    } else if delta < 86400 {
        let hours = delta / 3600;
        format!("{} hour{} ago", hours, if hours == 1 { "" } else { "s" })
    } else if delta < 86400 * 30 {
        let days = delta / 86400;
        format!("{} day{} ago", days, if days == 1 { "" } else { "s" })
    } else {
        format_ts_iso(ts)
    }
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}
