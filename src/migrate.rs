use anyhow::Result;
use sqlx::SqlitePool;

/// Create the schema. Idempotent: safe to run on every startup.
///
/// Two tables carry the whole index:
///
/// - `manifest` — one row per ingested document (`source_id` →
///   `content_hash`), the persisted change-detection state that makes
///   re-ingestion idempotent and resumable.
/// - `entries` — one row per chunk: text, provenance offsets, embedding
///   BLOB, and the document hash + model signature needed to detect
///   staleness without re-reading source files.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS manifest (
            source_id TEXT PRIMARY KEY,
            content_hash TEXT NOT NULL,
            mime_type TEXT NOT NULL,
            metadata_json TEXT NOT NULL DEFAULT '{}',
            chunk_count INTEGER NOT NULL,
            ingested_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS entries (
            chunk_id TEXT PRIMARY KEY,
            source_id TEXT NOT NULL,
            content_hash TEXT NOT NULL,
            seq INTEGER NOT NULL,
            text TEXT NOT NULL,
            start_offset INTEGER NOT NULL,
            end_offset INTEGER NOT NULL,
            embedding BLOB NOT NULL,
            model TEXT NOT NULL,
            dims INTEGER NOT NULL,
            UNIQUE(source_id, seq)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_entries_source ON entries(source_id)")
        .execute(pool)
        .await?;

    Ok(())
}
