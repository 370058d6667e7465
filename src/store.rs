//! SQLite-backed chunk vector store and hybrid retrieval.
//!
//! Each chunk is one row keyed by a generated UUID, carrying the metadata
//! payload, the dense vector as an f32 BLOB, and optional sparse
//! index/value BLOBs. Similarity is computed in-process: cosine for the
//! dense side, sparse dot product for the keyword side. Hybrid search is an
//! explicit two-pass-then-fuse: both sides retrieve candidates under the
//! same filter, scores are min-max normalized per side, then blended by
//! `sparse_weight`. The blend is a tunable weighted sum, never rank fusion.

use std::collections::HashMap;

use anyhow::Result;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use uuid::Uuid;

use crate::embedding::{
    blob_to_indices, blob_to_vec, cosine_similarity, indices_to_blob, sparse_dot, vec_to_blob,
    SparseVector,
};
use crate::models::{ChunkMetadata, StoredChunk};

/// Rows inserted per transaction when storing a large file.
const INSERT_BATCH: usize = 256;
/// Each fusion side retrieves `limit * CANDIDATE_FACTOR` candidates.
const CANDIDATE_FACTOR: usize = 3;

/// A chunk ready for storage: text, vectors, and payload metadata.
pub struct NewChunk {
    pub text: String,
    pub dense: Vec<f32>,
    pub sparse: Option<SparseVector>,
    pub metadata: ChunkMetadata,
}

/// Folder-scoped search restrictions.
///
/// `include_folders` is OR-matched against `folder_path` (empty means no
/// restriction); `exclude_folders` and `exclude_index_folders` are AND-NOT.
/// Folder values match themselves and their descendants; index-folder
/// excludes match the registration point exactly.
#[derive(Debug, Clone, Default)]
pub struct SearchFilter {
    pub include_folders: Vec<String>,
    pub exclude_folders: Vec<String>,
    pub exclude_index_folders: Vec<String>,
}

impl SearchFilter {
    fn matches(&self, folder_path: &str, index_folder: &str) -> bool {
        if !self.include_folders.is_empty()
            && !self
                .include_folders
                .iter()
                .any(|f| folder_under(folder_path, f))
        {
            return false;
        }
        if self
            .exclude_folders
            .iter()
            .any(|f| folder_under(folder_path, f))
        {
            return false;
        }
        !self
            .exclude_index_folders
            .iter()
            .any(|f| index_folder == f.trim_end_matches('/'))
    }
}

/// True when `folder_path` equals `filter` or lies underneath it.
pub(crate) fn folder_under(folder_path: &str, filter: &str) -> bool {
    let filter = filter.trim_end_matches('/');
    folder_path == filter
        || (folder_path.len() > filter.len()
            && folder_path.starts_with(filter)
            && folder_path.as_bytes()[filter.len()] == b'/')
}

/// One hybrid search request against the store.
pub struct SearchParams {
    pub dense: Vec<f32>,
    pub sparse: Option<SparseVector>,
    pub limit: usize,
    pub sparse_weight: f64,
    pub filter: SearchFilter,
}

#[derive(Clone)]
pub struct VectorStore {
    pool: SqlitePool,
}

struct CandidateRow {
    chunk: StoredChunk,
    dense: Vec<f32>,
    sparse: Option<SparseVector>,
}

impl VectorStore {
    pub fn new(pool: SqlitePool) -> Self {
        VectorStore { pool }
    }

    /// Store a batch of chunks, returning the generated ids in input order.
    pub async fn store_chunks(&self, chunks: &[NewChunk]) -> Result<Vec<String>> {
        let ids: Vec<String> = chunks.iter().map(|_| Uuid::new_v4().to_string()).collect();

        for (batch, batch_ids) in chunks.chunks(INSERT_BATCH).zip(ids.chunks(INSERT_BATCH)) {
            let mut tx = self.pool.begin().await?;
            for (chunk, id) in batch.iter().zip(batch_ids.iter()) {
                let m = &chunk.metadata;
                sqlx::query(
                    r#"
                    INSERT INTO chunks (
                        id, file_path, folder_path, index_folder, file_name,
                        chunk_index, total_chunks, start_char, end_char,
                        page_range, indexed_at, text, dense,
                        sparse_indices, sparse_values
                    )
                    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(id)
                .bind(&m.file_path)
                .bind(&m.folder_path)
                .bind(&m.index_folder)
                .bind(&m.file_name)
                .bind(m.chunk_index)
                .bind(m.total_chunks)
                .bind(m.start_char)
                .bind(m.end_char)
                .bind(&m.page_range)
                .bind(m.indexed_at)
                .bind(&chunk.text)
                .bind(vec_to_blob(&chunk.dense))
                .bind(chunk.sparse.as_ref().map(|s| indices_to_blob(&s.indices)))
                .bind(chunk.sparse.as_ref().map(|s| vec_to_blob(&s.values)))
                .execute(&mut *tx)
                .await?;
            }
            tx.commit().await?;
        }

        Ok(ids)
    }

    /// Delete all chunks for one file; returns the count removed.
    pub async fn delete_by_file(&self, file_path: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM chunks WHERE file_path = ?")
            .bind(file_path)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Delete chunks whose `folder_path` is `folder` or underneath it.
    pub async fn delete_by_folder(&self, folder: &str) -> Result<u64> {
        let folder = folder.trim_end_matches('/');
        let result = sqlx::query(
            r#"DELETE FROM chunks WHERE folder_path = ? OR folder_path LIKE ? ESCAPE '\'"#,
        )
        .bind(folder)
        .bind(like_prefix(folder))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Delete every chunk stored under one registered index folder.
    pub async fn delete_by_index_folder(&self, index_folder: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM chunks WHERE index_folder = ?")
            .bind(index_folder.trim_end_matches('/'))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Hybrid (or dense-only) retrieval, sorted by descending relevance.
    pub async fn search(&self, params: &SearchParams) -> Result<Vec<StoredChunk>> {
        let rows = self.scan_candidates(&params.filter).await?;
        if rows.is_empty() || params.limit == 0 {
            return Ok(Vec::new());
        }

        let candidate_k = params.limit * CANDIDATE_FACTOR;

        // Dense pass: cosine against every row under the filter.
        let mut dense: Vec<(usize, f64)> = rows
            .iter()
            .enumerate()
            .map(|(i, row)| (i, cosine_similarity(&params.dense, &row.dense) as f64))
            .collect();
        dense.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        dense.truncate(candidate_k);

        // Sparse pass only when a sparse query was supplied and sparse
        // vectors exist under the filter.
        let sparse: Vec<(usize, f64)> = match &params.sparse {
            Some(query) if !query.is_empty() => {
                let mut scored: Vec<(usize, f64)> = rows
                    .iter()
                    .enumerate()
                    .filter_map(|(i, row)| {
                        let doc = row.sparse.as_ref()?;
                        let score = sparse_dot(query, doc) as f64;
                        (score > 0.0).then_some((i, score))
                    })
                    .collect();
                scored.sort_by(|a, b| {
                    b.1.partial_cmp(&a.1)
                        .unwrap_or(std::cmp::Ordering::Equal)
                        .then(a.0.cmp(&b.0))
                });
                scored.truncate(candidate_k);
                scored
            }
            _ => Vec::new(),
        };

        let results = if sparse.is_empty() {
            // Dense-only fallback: raw cosine is the reported score.
            dense
        } else {
            fuse_scores(&dense, &sparse, params.sparse_weight)
        };

        Ok(results
            .into_iter()
            .take(params.limit)
            .map(|(i, score)| {
                let mut chunk = rows[i].chunk.clone();
                chunk.score = Some(score);
                chunk
            })
            .collect())
    }

    /// Chunks `first..=last` of one file, ordered by chunk index.
    pub async fn chunks_by_range(
        &self,
        file_path: &str,
        first: i64,
        last: i64,
    ) -> Result<Vec<StoredChunk>> {
        let rows = sqlx::query(
            r#"
            SELECT id, file_path, folder_path, index_folder, file_name,
                   chunk_index, total_chunks, start_char, end_char,
                   page_range, indexed_at, text
            FROM chunks
            WHERE file_path = ? AND chunk_index BETWEEN ? AND ?
            ORDER BY chunk_index
            "#,
        )
        .bind(file_path)
        .bind(first)
        .bind(last)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(row_to_chunk).collect())
    }

    pub async fn count_by_file(&self, file_path: &str) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks WHERE file_path = ?")
            .bind(file_path)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Load every chunk passing the filter, vectors included. Retrieval is a
    /// full scan with in-process scoring, the same shape as the relational
    /// store can serve without a vector extension.
    async fn scan_candidates(&self, filter: &SearchFilter) -> Result<Vec<CandidateRow>> {
        let rows = sqlx::query(
            r#"
            SELECT id, file_path, folder_path, index_folder, file_name,
                   chunk_index, total_chunks, start_char, end_char,
                   page_range, indexed_at, text, dense,
                   sparse_indices, sparse_values
            FROM chunks
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .filter(|row| {
                let folder_path: String = row.get("folder_path");
                let index_folder: String = row.get("index_folder");
                filter.matches(&folder_path, &index_folder)
            })
            .map(|row| {
                let dense_blob: Vec<u8> = row.get("dense");
                let sparse_indices: Option<Vec<u8>> = row.get("sparse_indices");
                let sparse_values: Option<Vec<u8>> = row.get("sparse_values");
                let sparse = match (sparse_indices, sparse_values) {
                    (Some(i), Some(v)) => Some(SparseVector {
                        indices: blob_to_indices(&i),
                        values: blob_to_vec(&v),
                    }),
                    _ => None,
                };
                CandidateRow {
                    chunk: row_to_chunk(row),
                    dense: blob_to_vec(&dense_blob),
                    sparse,
                }
            })
            .collect())
    }
}

fn row_to_chunk(row: &SqliteRow) -> StoredChunk {
    StoredChunk {
        id: row.get("id"),
        text: row.get("text"),
        score: None,
        metadata: ChunkMetadata {
            file_path: row.get("file_path"),
            folder_path: row.get("folder_path"),
            index_folder: row.get("index_folder"),
            file_name: row.get("file_name"),
            chunk_index: row.get("chunk_index"),
            total_chunks: row.get("total_chunks"),
            start_char: row.get("start_char"),
            end_char: row.get("end_char"),
            indexed_at: row.get("indexed_at"),
            page_range: row.get("page_range"),
        },
    }
}

/// SQL LIKE pattern matching descendants of `prefix`, metacharacters
/// escaped with backslash.
pub(crate) fn like_prefix(prefix: &str) -> String {
    let escaped = prefix
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("{}/%", escaped)
}

/// Min-max normalize raw scores into `[0, 1]`.
///
/// A single candidate normalizes to 1.0, as does every member of a
/// zero-spread set.
fn normalize_scores(candidates: &[(usize, f64)]) -> HashMap<usize, f64> {
    if candidates.is_empty() {
        return HashMap::new();
    }

    let s_min = candidates.iter().map(|(_, s)| *s).fold(f64::INFINITY, f64::min);
    let s_max = candidates
        .iter()
        .map(|(_, s)| *s)
        .fold(f64::NEG_INFINITY, f64::max);

    candidates
        .iter()
        .map(|(id, s)| {
            let norm = if (s_max - s_min).abs() < f64::EPSILON {
                1.0
            } else {
                (s - s_min) / (s_max - s_min)
            };
            (*id, norm)
        })
        .collect()
}

/// Fuse two candidate sets: normalize each side independently, blend by
/// `sparse_weight`, union by identity, sort descending (id as tie-break).
/// A candidate absent from one side contributes 0 for that side.
fn fuse_scores(
    dense: &[(usize, f64)],
    sparse: &[(usize, f64)],
    sparse_weight: f64,
) -> Vec<(usize, f64)> {
    let dense_norm = normalize_scores(dense);
    let sparse_norm = normalize_scores(sparse);

    let mut ids: Vec<usize> = dense.iter().map(|(i, _)| *i).collect();
    ids.extend(sparse.iter().map(|(i, _)| *i));
    ids.sort_unstable();
    ids.dedup();

    let mut fused: Vec<(usize, f64)> = ids
        .into_iter()
        .map(|id| {
            let d = dense_norm.get(&id).copied().unwrap_or(0.0);
            let s = sparse_norm.get(&id).copied().unwrap_or(0.0);
            (id, (1.0 - sparse_weight) * d + sparse_weight * s)
        })
        .collect();

    fused.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.0.cmp(&b.0))
    });
    fused
}

/// Concatenate consecutive chunks of one file, stripping the leading
/// `chunk_overlap` characters from every chunk after the first. Assumes the
/// chunker's exact-overlap invariant between consecutive chunks.
pub fn merge_chunk_texts(chunks: &[StoredChunk], chunk_overlap: usize) -> String {
    let mut out = String::new();
    for (i, chunk) in chunks.iter().enumerate() {
        if i == 0 {
            out.push_str(&chunk.text);
        } else {
            out.extend(chunk.text.chars().skip(chunk_overlap));
        }
    }
    out
}
