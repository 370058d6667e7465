//! Query-side engine: embeds the query, applies folder filters, and runs
//! hybrid retrieval against the store.

use anyhow::{bail, Result};
use sqlx::SqlitePool;
use std::path::PathBuf;

use crate::config::Config;
use crate::db;
use crate::embedding::{create_dense_embedder, create_sparse_embedder};
use crate::indexer::normalize_folder_arg;
use crate::models::{IndexState, StoredChunk};
use crate::store::{SearchFilter, SearchParams, VectorStore};

/// Characters of chunk text shown per CLI result.
const SNIPPET_CHARS: usize = 200;

/// Caller-facing knobs for one search. Folder values may be the registered
/// index folder or any folder underneath one.
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    pub limit: usize,
    pub sparse_weight: f64,
    /// Skip the sparse pass entirely and rank by raw cosine similarity.
    pub dense_only: bool,
    pub include_folders: Vec<String>,
    pub exclude_folders: Vec<String>,
    pub exclude_index_folders: Vec<String>,
}

/// Embed `query` and retrieve the best-matching chunks.
///
/// Disabled index folders are always excluded, on top of whatever the
/// caller passed. Their chunks stay in the store and return to visibility
/// when the folder is re-enabled.
pub async fn search_chunks(
    pool: &SqlitePool,
    config: &Config,
    query: &str,
    opts: &SearchOptions,
) -> Result<Vec<StoredChunk>> {
    let dense_embedder = create_dense_embedder(&config.embedding)?;
    let sparse_embedder = create_sparse_embedder(&config.sparse)?;

    let dense = dense_embedder.embed_query(query).await?;
    let sparse = match &sparse_embedder {
        Some(embedder) if !opts.dense_only => Some(embedder.embed_query(query).await?),
        _ => None,
    };

    let mut exclude_index_folders = opts.exclude_index_folders.clone();
    exclude_index_folders.extend(disabled_index_folders(pool).await?);

    let store = VectorStore::new(pool.clone());
    store
        .search(&SearchParams {
            dense,
            sparse,
            limit: opts.limit,
            sparse_weight: opts.sparse_weight,
            filter: SearchFilter {
                include_folders: opts.include_folders.clone(),
                exclude_folders: opts.exclude_folders.clone(),
                exclude_index_folders,
            },
        })
        .await
}

async fn disabled_index_folders(pool: &SqlitePool) -> Result<Vec<String>> {
    let folders = sqlx::query_scalar("SELECT folder_path FROM folder_index_status WHERE status = ?")
        .bind(IndexState::Disabled.as_str())
        .fetch_all(pool)
        .await?;
    Ok(folders)
}

/// CLI entry point for `resift search`.
pub async fn run_search(
    config: &Config,
    query: &str,
    limit: Option<usize>,
    sparse_weight: Option<f64>,
    folders: Vec<PathBuf>,
    exclude_folders: Vec<PathBuf>,
    dense_only: bool,
) -> Result<()> {
    if query.trim().is_empty() {
        println!("No results.");
        return Ok(());
    }
    if let Some(w) = sparse_weight {
        if !(0.0..=1.0).contains(&w) {
            bail!("Sparse weight must be between 0.0 and 1.0, got {}", w);
        }
    }
    let limit = limit.unwrap_or(config.search.default_limit);
    if limit == 0 {
        bail!("Limit must be at least 1");
    }

    let opts = SearchOptions {
        limit,
        sparse_weight: sparse_weight.unwrap_or(config.search.sparse_weight),
        dense_only,
        include_folders: folders.iter().map(|f| normalize_folder_arg(f)).collect(),
        exclude_folders: exclude_folders
            .iter()
            .map(|f| normalize_folder_arg(f))
            .collect(),
        ..Default::default()
    };

    let pool = db::connect(config).await?;
    let results = search_chunks(&pool, config, query, &opts).await?;

    if results.is_empty() {
        println!("No results.");
    } else {
        println!("Found {} result(s):\n", results.len());
        for (i, chunk) in results.iter().enumerate() {
            let m = &chunk.metadata;
            println!(
                "--- Result {} (score: {:.4}) ---",
                i + 1,
                chunk.score.unwrap_or(0.0)
            );
            println!(
                "File:  {} (chunk {} of {})",
                m.file_path,
                m.chunk_index + 1,
                m.total_chunks
            );
            if let Some(pages) = &m.page_range {
                println!("Pages: {}", pages);
            }
            println!("{}", snippet(&chunk.text, SNIPPET_CHARS));
            println!();
        }
    }

    pool.close().await;
    Ok(())
}

/// First `max_chars` characters of `text`, with an ellipsis when truncated.
fn snippet(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let mut out: String = text.chars().take(max_chars).collect();
        out.push_str("...");
        out
    }
}
