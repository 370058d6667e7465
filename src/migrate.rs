use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    run_migrations_on(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Create the schema on an already-open pool. Safe to run repeatedly.
pub async fn run_migrations_on(pool: &SqlitePool) -> Result<()> {
    // Per-file index records; chunk_count mirrors the chunks actually stored
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS indexed_files (
            file_path TEXT PRIMARY KEY,
            folder_path TEXT NOT NULL,
            index_folder TEXT NOT NULL,
            content_hash TEXT NOT NULL,
            file_size INTEGER NOT NULL,
            chunk_count INTEGER NOT NULL,
            indexed_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // One row per folder at which indexing was triggered
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS folder_index_status (
            folder_path TEXT PRIMARY KEY,
            status TEXT NOT NULL,
            error_message TEXT,
            indexed_at INTEGER
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Chunk points: metadata payload plus dense/sparse vectors
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chunks (
            id TEXT PRIMARY KEY,
            file_path TEXT NOT NULL,
            folder_path TEXT NOT NULL,
            index_folder TEXT NOT NULL,
            file_name TEXT NOT NULL,
            chunk_index INTEGER NOT NULL,
            total_chunks INTEGER NOT NULL,
            start_char INTEGER NOT NULL,
            end_char INTEGER NOT NULL,
            page_range TEXT,
            indexed_at INTEGER NOT NULL,
            text TEXT NOT NULL,
            dense BLOB NOT NULL,
            sparse_indices BLOB,
            sparse_values BLOB,
            UNIQUE(file_path, chunk_index)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_file_path ON chunks(file_path)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_folder_path ON chunks(folder_path)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_index_folder ON chunks(index_folder)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_indexed_files_index_folder ON indexed_files(index_folder)",
    )
    .execute(pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_folder_status ON folder_index_status(status)")
        .execute(pool)
        .await?;

    Ok(())
}
