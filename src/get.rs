//! Chunk retrieval by file path and index range.
//!
//! Fetches a contiguous run of a file's chunks, either printed one by one
//! or merged back into a single text with the inter-chunk overlap removed.

use anyhow::{bail, Result};
use sqlx::SqlitePool;
use std::fs;
use std::path::Path;

use crate::config::Config;
use crate::db;
use crate::indexer::path_str;
use crate::models::StoredChunk;
use crate::store::{merge_chunk_texts, VectorStore};

pub struct FileChunks {
    pub file_path: String,
    pub total_chunks: i64,
    pub chunks: Vec<StoredChunk>,
}

/// Core get function returning structured data.
///
/// `start`/`end` are inclusive chunk indexes; out-of-range bounds are
/// clamped into `0..total`. A file with no stored chunks is an error.
pub async fn get_chunks(
    pool: &SqlitePool,
    file_path: &str,
    start: Option<i64>,
    end: Option<i64>,
) -> Result<FileChunks> {
    let store = VectorStore::new(pool.clone());
    let total = store.count_by_file(file_path).await?;
    if total == 0 {
        bail!("file not indexed: {}", file_path);
    }

    let first = start.unwrap_or(0).clamp(0, total - 1);
    let last = end.unwrap_or(total - 1).clamp(first, total - 1);

    let chunks = store.chunks_by_range(file_path, first, last).await?;
    Ok(FileChunks {
        file_path: file_path.to_string(),
        total_chunks: total,
        chunks,
    })
}

/// CLI entry point for `resift get`.
///
/// The path is canonicalized when it still exists on disk, so relative
/// arguments resolve to the stored absolute form. Deleted files can be
/// queried by their stored path.
pub async fn run_get(
    config: &Config,
    file: &Path,
    start: Option<i64>,
    end: Option<i64>,
    merge: bool,
) -> Result<()> {
    let file_path = match fs::canonicalize(file) {
        Ok(p) => path_str(&p),
        Err(_) => path_str(file),
    };
    let pool = db::connect(config).await?;
    let result = match get_chunks(&pool, &file_path, start, end).await {
        Ok(r) => r,
        Err(e) => {
            pool.close().await;
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    if merge {
        println!(
            "{}",
            merge_chunk_texts(&result.chunks, config.chunking.chunk_overlap)
        );
    } else {
        println!(
            "--- {} ({} chunk(s) indexed) ---",
            result.file_path, result.total_chunks
        );
        println!();
        for chunk in &result.chunks {
            print_chunk(chunk);
        }
    }

    pool.close().await;
    Ok(())
}

fn print_chunk(chunk: &StoredChunk) {
    let m = &chunk.metadata;
    println!(
        "[chunk {} of {}] chars {}..{}",
        m.chunk_index, m.total_chunks, m.start_char, m.end_char
    );
    if let Some(pages) = &m.page_range {
        println!("pages: {}", pages);
    }
    println!("{}", chunk.text);
    println!();
}
