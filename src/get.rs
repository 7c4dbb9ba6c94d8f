//! Document inspection by source id.
//!
//! Prints a document's manifest row and every indexed chunk with its
//! offsets. Useful for checking what retrieval will actually see.

use anyhow::{bail, Result};
use sqlx::Row;

use crate::config::Config;
use crate::db;

pub async fn run_get(config: &Config, source_id: &str) -> Result<()> {
    let pool = db::connect(&config.index.path).await?;

    let manifest_row = sqlx::query(
        "SELECT source_id, content_hash, mime_type, metadata_json, chunk_count, ingested_at FROM manifest WHERE source_id = ?",
    )
    .bind(source_id)
    .fetch_optional(&pool)
    .await?;

    let manifest_row = match manifest_row {
        Some(row) => row,
        None => {
            pool.close().await;
            bail!("document not found: {}", source_id);
        }
    };

    let content_hash: String = manifest_row.get("content_hash");
    let mime_type: String = manifest_row.get("mime_type");
    let metadata_json: String = manifest_row.get("metadata_json");
    let chunk_count: i64 = manifest_row.get("chunk_count");
    let ingested_at: i64 = manifest_row.get("ingested_at");

    println!("--- Document ---");
    println!("source_id:    {}", source_id);
    println!("content_hash: {}", content_hash);
    println!("mime_type:    {}", mime_type);
    println!("metadata:     {}", metadata_json);
    println!("ingested_at:  {}", format_ts_iso(ingested_at));
    println!();

    let chunk_rows = sqlx::query(
        "SELECT chunk_id, seq, text, start_offset, end_offset FROM entries WHERE source_id = ? ORDER BY seq ASC",
    )
    .bind(source_id)
    .fetch_all(&pool)
    .await?;

    println!("--- Chunks ({}) ---", chunk_count);
    for row in &chunk_rows {
        let seq: i64 = row.get("seq");
        let start: i64 = row.get("start_offset");
        let end: i64 = row.get("end_offset");
        let chunk_id: String = row.get("chunk_id");
        let text: String = row.get("text");
        println!("[chunk {} @ chars {}..{}] {}", seq, start, end, chunk_id);
        println!("{}", text);
        println!();
    }

    pool.close().await;
    Ok(())
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        .unwrap_or_else(|| ts.to_string())
}
