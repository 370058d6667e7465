//! Indexing coordinator.
//!
//! Owns change detection and the write ordering that keeps the relational
//! records, the chunk store, and the filesystem consistent: per-file
//! indexing with hash-based skip, folder walks, and disk-vs-index
//! reconciliation. The invariant maintained throughout is that a file's
//! record advances only after its chunks are fully written; on any failure
//! the record stays eligible for retry.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use sha2::{Digest, Sha256};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use walkdir::WalkDir;

use crate::chunker::{chunk_text, ChunkConfig};
use crate::config::Config;
use crate::db;
use crate::embedding::{
    create_dense_embedder, create_sparse_embedder, DenseEmbedder, SparseEmbedder,
};
use crate::models::{
    ChunkMetadata, FolderStatus, FolderSummary, IndexOutcome, IndexState, IndexedFile, SyncSummary,
};
use crate::parser::ParserRegistry;
use crate::store::{folder_under, like_prefix, NewChunk, VectorStore};

pub struct Indexer {
    pool: SqlitePool,
    store: VectorStore,
    parsers: ParserRegistry,
    dense: Arc<dyn DenseEmbedder>,
    sparse: Option<Arc<dyn SparseEmbedder>>,
    chunking: ChunkConfig,
    batch_size: usize,
    exclude: GlobSet,
}

impl Indexer {
    pub fn new(pool: SqlitePool, config: &Config) -> Result<Indexer> {
        Ok(Indexer {
            store: VectorStore::new(pool.clone()),
            pool,
            parsers: ParserRegistry::with_defaults(),
            dense: create_dense_embedder(&config.embedding)?,
            sparse: create_sparse_embedder(&config.sparse)?,
            chunking: config.chunking.clone(),
            batch_size: config.embedding.batch_size,
            exclude: build_exclude_globs(&config.indexing.exclude_globs)?,
        })
    }

    /// Index one file, skipping work when its content hash is unchanged.
    ///
    /// Returns `was_indexed = false` with the existing chunk count for
    /// hash-unchanged files, and for files that fail to parse or parse to
    /// nothing (their prior index, if any, is left in place).
    pub async fn index_file(
        &self,
        file_path: &Path,
        index_folder: &str,
        force: bool,
    ) -> Result<IndexOutcome> {
        let file_str = path_str(file_path);
        let bytes = fs::read(file_path)
            .with_context(|| format!("failed to read file: {}", file_str))?;
        let content_hash = sha256_hex(&bytes);
        let file_size = bytes.len() as i64;

        let existing = self.fetch_record(&file_str).await?;
        let prior_count = existing.as_ref().map(|r| r.chunk_count).unwrap_or(0);

        // A row with chunk_count == 0 is a placeholder, never a skip.
        if !force {
            if let Some(record) = &existing {
                if record.content_hash == content_hash && record.chunk_count > 0 {
                    return Ok(IndexOutcome {
                        was_indexed: false,
                        chunk_count: record.chunk_count,
                    });
                }
            }
        }

        let parsed = match self.parsers.parse(file_path) {
            Ok(doc) => doc,
            Err(e) => {
                tracing::warn!(file = %file_str, error = %format!("{:#}", e), "parse failed, skipping");
                return Ok(IndexOutcome {
                    was_indexed: false,
                    chunk_count: prior_count,
                });
            }
        };

        let chunks = chunk_text(&parsed.text, &self.chunking);
        if chunks.is_empty() {
            tracing::debug!(file = %file_str, "nothing to index, skipping");
            return Ok(IndexOutcome {
                was_indexed: false,
                chunk_count: prior_count,
            });
        }

        // Delete before inserting, never interleaved, so a concurrent search
        // sees either the old chunks or the new ones. Zeroing the count marks
        // the record as a placeholder until the new write lands.
        self.store.delete_by_file(&file_str).await?;
        if existing.is_some() {
            self.zero_chunk_count(&file_str).await?;
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let dense_vectors = self.embed_dense(&texts).await?;
        if dense_vectors.len() != chunks.len() {
            bail!(
                "embedding count mismatch for {}: {} chunks, {} vectors",
                file_str,
                chunks.len(),
                dense_vectors.len()
            );
        }
        let sparse_vectors = self.embed_sparse(&texts).await?;
        if let Some(sv) = &sparse_vectors {
            if sv.len() != chunks.len() {
                bail!(
                    "sparse embedding count mismatch for {}: {} chunks, {} vectors",
                    file_str,
                    chunks.len(),
                    sv.len()
                );
            }
        }

        let now = chrono::Utc::now().timestamp();
        let total = chunks.len() as i64;
        let folder_path = file_path.parent().map(path_str).unwrap_or_default();
        let file_name = file_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut new_chunks = Vec::with_capacity(chunks.len());
        for (i, (chunk, dense)) in chunks.iter().zip(dense_vectors).enumerate() {
            new_chunks.push(NewChunk {
                text: chunk.text.clone(),
                dense,
                sparse: sparse_vectors.as_ref().map(|v| v[i].clone()),
                metadata: ChunkMetadata {
                    file_path: file_str.clone(),
                    folder_path: folder_path.clone(),
                    index_folder: index_folder.to_string(),
                    file_name: file_name.clone(),
                    chunk_index: chunk.index as i64,
                    total_chunks: total,
                    start_char: chunk.start_offset as i64,
                    end_char: chunk.end_offset as i64,
                    indexed_at: now,
                    page_range: page_range_for(
                        &parsed.page_breaks,
                        chunk.start_offset,
                        chunk.end_offset,
                    ),
                },
            });
        }

        self.store.store_chunks(&new_chunks).await?;

        // The record advances only after the chunk write succeeded.
        self.upsert_record(&IndexedFile {
            file_path: file_str,
            folder_path,
            index_folder: index_folder.to_string(),
            content_hash,
            file_size,
            chunk_count: total,
            indexed_at: now,
            updated_at: now,
        })
        .await?;

        Ok(IndexOutcome {
            was_indexed: true,
            chunk_count: total,
        })
    }

    /// Index every parseable file under `folder`, recursively.
    ///
    /// The folder's status moves to `indexing` on entry and `indexed` on
    /// success; any error is recorded as status `error` and returned.
    pub async fn index_folder(&self, folder: &Path, force: bool) -> Result<FolderSummary> {
        let folder_str = path_str(folder);
        if !folder.is_dir() {
            let message = format!("not a directory: {}", folder_str);
            self.set_status(&folder_str, IndexState::Error, Some(&message))
                .await?;
            bail!("{}", message);
        }

        self.set_status(&folder_str, IndexState::Indexing, None)
            .await?;
        tracing::info!(folder = %folder_str, force, "indexing folder");

        match self.index_folder_inner(folder, &folder_str, force).await {
            Ok(summary) => {
                self.set_status(&folder_str, IndexState::Indexed, None)
                    .await?;
                tracing::info!(
                    folder = %folder_str,
                    files = summary.files_indexed,
                    chunks = summary.total_chunks,
                    skipped = summary.files_skipped,
                    "folder indexed"
                );
                Ok(summary)
            }
            Err(e) => {
                self.set_status(&folder_str, IndexState::Error, Some(&format!("{:#}", e)))
                    .await?;
                Err(e)
            }
        }
    }

    async fn index_folder_inner(
        &self,
        folder: &Path,
        folder_str: &str,
        force: bool,
    ) -> Result<FolderSummary> {
        let mut summary = FolderSummary::default();
        for file in self.list_parseable_files(folder)? {
            let outcome = self.index_file(&file, folder_str, force).await?;
            if outcome.was_indexed {
                summary.files_indexed += 1;
                summary.total_chunks += outcome.chunk_count as u64;
            } else {
                summary.files_skipped += 1;
            }
        }
        Ok(summary)
    }

    /// Reconcile the index with the filesystem for one index folder.
    ///
    /// Files gone from disk lose their record and chunks; new and changed
    /// files are indexed; hash-unchanged files are left alone. This is the
    /// path that absorbs external mutation the watcher never saw.
    pub async fn sync_folder(&self, folder: &Path) -> Result<SyncSummary> {
        let folder_str = path_str(folder);
        self.set_status(&folder_str, IndexState::Indexing, None)
            .await?;

        match self.sync_folder_inner(folder, &folder_str).await {
            Ok(summary) => {
                self.set_status(&folder_str, IndexState::Indexed, None)
                    .await?;
                tracing::info!(
                    folder = %folder_str,
                    added = summary.added,
                    removed = summary.removed,
                    unchanged = summary.unchanged,
                    "folder synced"
                );
                Ok(summary)
            }
            Err(e) => {
                self.set_status(&folder_str, IndexState::Error, Some(&format!("{:#}", e)))
                    .await?;
                Err(e)
            }
        }
    }

    async fn sync_folder_inner(&self, folder: &Path, folder_str: &str) -> Result<SyncSummary> {
        let indexed: Vec<String> =
            sqlx::query_scalar("SELECT file_path FROM indexed_files WHERE index_folder = ?")
                .bind(folder_str)
                .fetch_all(&self.pool)
                .await?;

        let on_disk = self.list_parseable_files(folder)?;
        let on_disk_set: HashSet<String> = on_disk.iter().map(|p| path_str(p)).collect();

        let mut summary = SyncSummary::default();
        for stale in indexed.iter().filter(|p| !on_disk_set.contains(p.as_str())) {
            self.remove_file(stale).await?;
            summary.removed += 1;
        }
        for file in &on_disk {
            let outcome = self.index_file(file, folder_str, false).await?;
            if outcome.was_indexed {
                summary.added += 1;
            } else {
                summary.unchanged += 1;
            }
        }
        Ok(summary)
    }

    /// Remove one file's chunks and record; returns chunks removed.
    pub async fn remove_file(&self, file_path: &str) -> Result<u64> {
        let removed = self.store.delete_by_file(file_path).await?;
        sqlx::query("DELETE FROM indexed_files WHERE file_path = ?")
            .bind(file_path)
            .execute(&self.pool)
            .await?;
        Ok(removed)
    }

    /// Deletion handler for the watcher: drops the path's own file record
    /// and everything recorded underneath it, including the status rows of
    /// any index folders inside. Removal events do not reliably distinguish
    /// files from directories, so both shapes are cleared on every call;
    /// the one that does not match the path is a no-op.
    pub async fn remove_path(&self, path: &str) -> Result<u64> {
        let path = path.trim_end_matches('/');
        let mut removed = self.remove_file(path).await?;
        removed += self.store.delete_by_folder(path).await?;
        sqlx::query(
            r#"DELETE FROM indexed_files WHERE folder_path = ? OR folder_path LIKE ? ESCAPE '\'"#,
        )
        .bind(path)
        .bind(like_prefix(path))
        .execute(&self.pool)
        .await?;
        sqlx::query(
            r#"DELETE FROM folder_index_status WHERE folder_path = ? OR folder_path LIKE ? ESCAPE '\'"#,
        )
        .bind(path)
        .bind(like_prefix(path))
        .execute(&self.pool)
        .await?;
        Ok(removed)
    }

    /// Mark the nearest enclosing index folder of `path` as pending so the
    /// worker re-syncs it. Disabled folders are left untouched.
    pub async fn invalidate_containing_folder(&self, path: &str) -> Result<Option<String>> {
        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT folder_path, status FROM folder_index_status")
                .fetch_all(&self.pool)
                .await?;

        let target = rows
            .into_iter()
            .filter(|(folder, status)| {
                folder_under(path, folder) && status != IndexState::Disabled.as_str()
            })
            .max_by_key(|(folder, _)| folder.len());

        match target {
            Some((folder, _)) => {
                self.mark_pending(&folder).await?;
                Ok(Some(folder))
            }
            None => Ok(None),
        }
    }

    pub async fn mark_pending(&self, folder: &str) -> Result<()> {
        self.set_status(folder, IndexState::Pending, None).await
    }

    /// Hide a folder from search without touching its chunks.
    pub async fn disable_folder(&self, folder: &str) -> Result<bool> {
        let result = sqlx::query("UPDATE folder_index_status SET status = ? WHERE folder_path = ?")
            .bind(IndexState::Disabled.as_str())
            .bind(folder)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Make a disabled folder searchable again. The caller is expected to
    /// follow up with `sync_folder` to absorb drift.
    pub async fn enable_folder(&self, folder: &str) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE folder_index_status SET status = ? WHERE folder_path = ? AND status = ?",
        )
        .bind(IndexState::Indexed.as_str())
        .bind(folder)
        .bind(IndexState::Disabled.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Permanently remove an index: chunks, file records, and the status
    /// row. Returns (chunks removed, file records removed).
    pub async fn remove_folder_index(&self, folder: &str) -> Result<(u64, u64)> {
        let chunks = self.store.delete_by_index_folder(folder).await?;
        let files = sqlx::query("DELETE FROM indexed_files WHERE index_folder = ?")
            .bind(folder)
            .execute(&self.pool)
            .await?
            .rows_affected();
        sqlx::query("DELETE FROM folder_index_status WHERE folder_path = ?")
            .bind(folder)
            .execute(&self.pool)
            .await?;
        Ok((chunks, files))
    }

    pub async fn folder_status(&self, folder: &str) -> Result<Option<FolderStatus>> {
        let row = sqlx::query(
            "SELECT folder_path, status, error_message, indexed_at FROM folder_index_status WHERE folder_path = ?",
        )
        .bind(folder)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|r| folder_status_from_row(&r)).transpose()
    }

    pub async fn pending_folders(&self) -> Result<Vec<String>> {
        let folders = sqlx::query_scalar(
            "SELECT folder_path FROM folder_index_status WHERE status = ? ORDER BY folder_path",
        )
        .bind(IndexState::Pending.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(folders)
    }

    async fn set_status(
        &self,
        folder: &str,
        state: IndexState,
        error_message: Option<&str>,
    ) -> Result<()> {
        let indexed_at = matches!(state, IndexState::Indexed)
            .then(|| chrono::Utc::now().timestamp());
        sqlx::query(
            r#"
            INSERT INTO folder_index_status (folder_path, status, error_message, indexed_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(folder_path) DO UPDATE SET
                status = excluded.status,
                error_message = excluded.error_message,
                indexed_at = COALESCE(excluded.indexed_at, folder_index_status.indexed_at)
            "#,
        )
        .bind(folder)
        .bind(state.as_str())
        .bind(error_message)
        .bind(indexed_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn fetch_record(&self, file_path: &str) -> Result<Option<IndexedFile>> {
        let row = sqlx::query(
            r#"
            SELECT file_path, folder_path, index_folder, content_hash,
                   file_size, chunk_count, indexed_at, updated_at
            FROM indexed_files WHERE file_path = ?
            "#,
        )
        .bind(file_path)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| IndexedFile {
            file_path: r.get("file_path"),
            folder_path: r.get("folder_path"),
            index_folder: r.get("index_folder"),
            content_hash: r.get("content_hash"),
            file_size: r.get("file_size"),
            chunk_count: r.get("chunk_count"),
            indexed_at: r.get("indexed_at"),
            updated_at: r.get("updated_at"),
        }))
    }

    async fn upsert_record(&self, record: &IndexedFile) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO indexed_files (file_path, folder_path, index_folder, content_hash, file_size, chunk_count, indexed_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(file_path) DO UPDATE SET
                folder_path = excluded.folder_path,
                index_folder = excluded.index_folder,
                content_hash = excluded.content_hash,
                file_size = excluded.file_size,
                chunk_count = excluded.chunk_count,
                indexed_at = excluded.indexed_at,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&record.file_path)
        .bind(&record.folder_path)
        .bind(&record.index_folder)
        .bind(&record.content_hash)
        .bind(record.file_size)
        .bind(record.chunk_count)
        .bind(record.indexed_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn zero_chunk_count(&self, file_path: &str) -> Result<()> {
        sqlx::query("UPDATE indexed_files SET chunk_count = 0, updated_at = ? WHERE file_path = ?")
            .bind(chrono::Utc::now().timestamp())
            .bind(file_path)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn embed_dense(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            vectors.extend(self.dense.embed_batch(batch).await?);
        }
        Ok(vectors)
    }

    async fn embed_sparse(
        &self,
        texts: &[String],
    ) -> Result<Option<Vec<crate::embedding::SparseVector>>> {
        let embedder = match &self.sparse {
            Some(e) => e,
            None => return Ok(None),
        };
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            vectors.extend(embedder.embed_batch(batch).await?);
        }
        Ok(Some(vectors))
    }

    /// All files under `folder` the parser registry recognizes, sorted,
    /// skipping dot-entries and configured exclusions.
    fn list_parseable_files(&self, folder: &Path) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        let walker = WalkDir::new(folder).follow_links(false).into_iter();
        for entry in walker.filter_entry(|e| !should_skip(e.path(), e.depth(), &self.exclude)) {
            let entry = entry.with_context(|| format!("failed to walk {}", folder.display()))?;
            if entry.file_type().is_file() && self.parsers.can_parse(entry.path()) {
                files.push(entry.path().to_path_buf());
            }
        }
        files.sort();
        Ok(files)
    }
}

pub(crate) fn folder_status_from_row(row: &SqliteRow) -> Result<FolderStatus> {
    let status: String = row.get("status");
    let state = IndexState::parse(&status)
        .ok_or_else(|| anyhow!("unknown index status in database: {}", status))?;
    Ok(FolderStatus {
        folder_path: row.get("folder_path"),
        state,
        error_message: row.get("error_message"),
        indexed_at: row.get("indexed_at"),
    })
}

pub(crate) fn path_str(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

fn build_exclude_globs(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(
            Glob::new(pattern)
                .with_context(|| format!("invalid exclude pattern: {}", pattern))?,
        );
    }
    Ok(builder.build()?)
}

/// Walk filter: dot-entries and excluded globs are skipped, but never the
/// walk root itself (depth 0).
fn should_skip(path: &Path, depth: usize, exclude: &GlobSet) -> bool {
    if depth == 0 {
        return false;
    }
    if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
        if name.starts_with('.') {
            return true;
        }
    }
    exclude.is_match(path)
}

/// 1-based page range covering chunk characters `[start, end)`, derived
/// from the parser's page break offsets. `None` when the document has no
/// page structure.
fn page_range_for(page_breaks: &[usize], start: usize, end: usize) -> Option<String> {
    if page_breaks.is_empty() {
        return None;
    }
    let page_of = |offset: usize| page_breaks.partition_point(|b| *b <= offset) + 1;
    let first = page_of(start);
    let last = page_of(end.saturating_sub(1).max(start));
    Some(if first == last {
        first.to_string()
    } else {
        format!("{}-{}", first, last)
    })
}

/// Resolve a user-supplied folder argument to the canonical stored form.
/// Falls back to the literal path for folders no longer on disk so that
/// disable/remove keep working after deletion.
pub(crate) fn normalize_folder_arg(folder: &Path) -> String {
    match fs::canonicalize(folder) {
        Ok(p) => path_str(&p),
        Err(_) => {
            let s = path_str(folder);
            let trimmed = s.trim_end_matches('/');
            if trimmed.is_empty() {
                s
            } else {
                trimmed.to_string()
            }
        }
    }
}

pub async fn run_index(config: &Config, folder: &Path, force: bool) -> Result<()> {
    let folder = fs::canonicalize(folder)
        .with_context(|| format!("folder not found: {}", folder.display()))?;

    let pool = db::connect(config).await?;
    let indexer = Indexer::new(pool.clone(), config)?;
    let result = indexer.index_folder(&folder, force).await;
    pool.close().await;
    let summary = result?;

    println!("index {}", folder.display());
    println!("  files indexed: {}", summary.files_indexed);
    println!("  chunks written: {}", summary.total_chunks);
    println!("  files skipped: {}", summary.files_skipped);
    println!("ok");
    Ok(())
}

pub async fn run_sync(config: &Config, folder: &Path) -> Result<()> {
    let folder = fs::canonicalize(folder)
        .with_context(|| format!("folder not found: {}", folder.display()))?;

    let pool = db::connect(config).await?;
    let indexer = Indexer::new(pool.clone(), config)?;
    let result = indexer.sync_folder(&folder).await;
    pool.close().await;
    let summary = result?;

    println!("sync {}", folder.display());
    println!("  added: {}", summary.added);
    println!("  removed: {}", summary.removed);
    println!("  unchanged: {}", summary.unchanged);
    println!("ok");
    Ok(())
}

/// Queue a folder for the background worker instead of indexing inline.
pub async fn run_reindex(config: &Config, folder: &Path) -> Result<()> {
    let folder_str = normalize_folder_arg(folder);
    let pool = db::connect(config).await?;
    let indexer = Indexer::new(pool.clone(), config)?;

    let status = indexer.folder_status(&folder_str).await?;
    let outcome = match status {
        None => Err(anyhow!("no index registered for {}", folder_str)),
        Some(s) if s.state == IndexState::Disabled => Err(anyhow!(
            "index for {} is disabled; enable it first",
            folder_str
        )),
        Some(_) => indexer.mark_pending(&folder_str).await,
    };
    pool.close().await;
    outcome?;

    println!("queued {} for re-indexing", folder_str);
    println!("ok");
    Ok(())
}

pub async fn run_disable(config: &Config, folder: &Path) -> Result<()> {
    let folder_str = normalize_folder_arg(folder);
    let pool = db::connect(config).await?;
    let indexer = Indexer::new(pool.clone(), config)?;
    let disabled = indexer.disable_folder(&folder_str).await;
    pool.close().await;

    if !disabled? {
        bail!("no index registered for {}", folder_str);
    }
    println!("search disabled for {}", folder_str);
    println!("ok");
    Ok(())
}

pub async fn run_enable(config: &Config, folder: &Path) -> Result<()> {
    let folder_str = normalize_folder_arg(folder);
    let pool = db::connect(config).await?;
    let indexer = Indexer::new(pool.clone(), config)?;

    let enabled = indexer.enable_folder(&folder_str).await;
    match enabled {
        Ok(true) => {}
        Ok(false) => {
            pool.close().await;
            bail!("no disabled index found for {}", folder_str);
        }
        Err(e) => {
            pool.close().await;
            return Err(e);
        }
    }
    println!("search enabled for {}", folder_str);

    // Reconcile whatever changed on disk while the folder was disabled.
    let result = indexer.sync_folder(Path::new(&folder_str)).await;
    pool.close().await;
    let summary = result?;

    println!("  added: {}", summary.added);
    println!("  removed: {}", summary.removed);
    println!("  unchanged: {}", summary.unchanged);
    println!("ok");
    Ok(())
}

pub async fn run_remove(config: &Config, folder: &Path, yes: bool) -> Result<()> {
    let folder_str = normalize_folder_arg(folder);
    if !yes {
        bail!(
            "this permanently deletes the index for {}; pass --yes to confirm",
            folder_str
        );
    }
    let pool = db::connect(config).await?;
    let indexer = Indexer::new(pool.clone(), config)?;

    let status = indexer.folder_status(&folder_str).await;
    let removed = indexer.remove_folder_index(&folder_str).await;
    pool.close().await;

    let status = status?;
    let (chunks, files) = removed?;
    if status.is_none() && chunks == 0 && files == 0 {
        bail!("no index registered for {}", folder_str);
    }

    println!("removed index for {}", folder_str);
    println!("  files removed: {}", files);
    println!("  chunks removed: {}", chunks);
    println!("ok");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_hex_known_digest() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_page_range_none_without_breaks() {
        assert_eq!(page_range_for(&[], 0, 100), None);
    }

    #[test]
    fn test_page_range_single_page() {
        // Pages: [0, 50) is page 1, [50, ..) is page 2.
        assert_eq!(page_range_for(&[50], 0, 40).as_deref(), Some("1"));
        assert_eq!(page_range_for(&[50], 60, 80).as_deref(), Some("2"));
    }

    #[test]
    fn test_page_range_spanning_pages() {
        assert_eq!(page_range_for(&[50, 100], 40, 120).as_deref(), Some("1-3"));
        assert_eq!(page_range_for(&[50], 40, 60).as_deref(), Some("1-2"));
    }

    #[test]
    fn test_page_range_boundary_chunk() {
        // A chunk starting exactly at a break belongs to the new page.
        assert_eq!(page_range_for(&[50], 50, 60).as_deref(), Some("2"));
        // end is exclusive: a chunk ending at the break stays on page 1.
        assert_eq!(page_range_for(&[50], 30, 50).as_deref(), Some("1"));
    }

    #[test]
    fn test_should_skip_dot_entries_but_not_root() {
        let empty = GlobSetBuilder::new().build().unwrap();
        assert!(should_skip(Path::new("/data/.git"), 1, &empty));
        assert!(should_skip(Path::new("/data/sub/.hidden.txt"), 2, &empty));
        assert!(!should_skip(Path::new("/data/notes.txt"), 1, &empty));
        assert!(!should_skip(Path::new("/data/.dotroot"), 0, &empty));
    }

    #[test]
    fn test_should_skip_exclude_globs() {
        let globs = build_exclude_globs(&["*.tmp".to_string(), "**/build".to_string()]).unwrap();
        assert!(should_skip(Path::new("/data/scratch.tmp"), 1, &globs));
        assert!(should_skip(Path::new("/data/a/build"), 2, &globs));
        assert!(!should_skip(Path::new("/data/notes.txt"), 1, &globs));
    }

    #[test]
    fn test_normalize_folder_arg_trims_missing_paths() {
        assert_eq!(
            normalize_folder_arg(Path::new("/no/such/folder/")),
            "/no/such/folder"
        );
    }
}
