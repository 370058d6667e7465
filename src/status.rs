//! Index status overview.
//!
//! Summarizes what is indexed: per-folder lifecycle state, file and chunk
//! counts, and last-indexed times. Indexing failures surface here through
//! the folder's `error` status and stored message.

use std::path::Path;

use anyhow::Result;
use sqlx::{Row, SqlitePool};

use crate::config::Config;
use crate::db;
use crate::indexer::normalize_folder_arg;
use crate::models::IndexState;

struct FolderRow {
    folder_path: String,
    status: String,
    error_message: Option<String>,
    indexed_at: Option<i64>,
    file_count: i64,
    chunk_count: i64,
}

const FOLDER_QUERY: &str = r#"
    SELECT
        s.folder_path,
        s.status,
        s.error_message,
        s.indexed_at,
        COUNT(f.file_path) AS file_count,
        COALESCE(SUM(f.chunk_count), 0) AS chunk_count
    FROM folder_index_status s
    LEFT JOIN indexed_files f ON f.index_folder = s.folder_path
"#;

/// Run the status command: one folder in detail, or the full overview.
pub async fn run_status(config: &Config, folder: Option<&Path>) -> Result<()> {
    let pool = db::connect(config).await?;
    let result = match folder {
        Some(f) => print_folder_status(&pool, f).await,
        None => print_overview(config, &pool).await,
    };
    pool.close().await;
    result
}

async fn print_folder_status(pool: &SqlitePool, folder: &Path) -> Result<()> {
    let folder_str = normalize_folder_arg(folder);
    let row = sqlx::query(&format!(
        "{} WHERE s.folder_path = ? GROUP BY s.folder_path",
        FOLDER_QUERY
    ))
    .bind(&folder_str)
    .fetch_optional(pool)
    .await?;

    let row = match row {
        Some(r) => folder_row(&r),
        None => {
            println!("no index registered for {}", folder_str);
            return Ok(());
        }
    };

    println!("Folder:       {}", row.folder_path);
    println!("Status:       {}", row.status);
    if let Some(message) = &row.error_message {
        if !message.is_empty() {
            println!("Error:        {}", message);
        }
    }
    println!("Files:        {}", row.file_count);
    println!("Chunks:       {}", row.chunk_count);
    println!(
        "Last indexed: {}",
        row.indexed_at
            .map(format_ts_relative)
            .unwrap_or_else(|| "never".to_string())
    );

    Ok(())
}

async fn print_overview(config: &Config, pool: &SqlitePool) -> Result<()> {
    let total_files: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM indexed_files")
        .fetch_one(pool)
        .await?;
    let total_chunks: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks")
        .fetch_one(pool)
        .await?;

    let folder_rows = sqlx::query(&format!(
        "{} GROUP BY s.folder_path ORDER BY s.folder_path",
        FOLDER_QUERY
    ))
    .fetch_all(pool)
    .await?;
    let folders: Vec<FolderRow> = folder_rows.iter().map(folder_row).collect();

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("Resift — Index Status");
    println!("=====================");
    println!();
    println!("  Database:      {}", config.db.path.display());
    println!("  Size:          {}", format_bytes(db_size));
    println!();
    println!("  Index folders: {}", folders.len());
    println!("  Files:         {}", total_files);
    println!("  Chunks:        {}", total_chunks);

    if !folders.is_empty() {
        println!();
        println!(
            "  {:<40} {:<9} {:>6} {:>8}   {}",
            "FOLDER", "STATUS", "FILES", "CHUNKS", "LAST INDEXED"
        );
        println!("  {}", "-".repeat(84));

        for f in &folders {
            let indexed_display = match f.indexed_at {
                Some(ts) => format_ts_relative(ts),
                None => "never".to_string(),
            };
            println!(
                "  {:<40} {:<9} {:>6} {:>8}   {}",
                f.folder_path, f.status, f.file_count, f.chunk_count, indexed_display
            );
            if f.status == IndexState::Error.as_str() {
                if let Some(message) = &f.error_message {
                    println!("  {:<40} {}", "", message);
                }
            }
        }
    }

    println!();
    Ok(())
}

fn folder_row(row: &sqlx::sqlite::SqliteRow) -> FolderRow {
    FolderRow {
        folder_path: row.get("folder_path"),
        status: row.get("status"),
        error_message: row.get("error_message"),
        indexed_at: row.get("indexed_at"),
        file_count: row.get("file_count"),
        chunk_count: row.get("chunk_count"),
    }
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
