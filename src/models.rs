//! Core data models shared across the indexing and retrieval pipeline.

/// A segment of one document's text, produced by the chunking engine.
///
/// `index` is 0-based and contiguous within a file. Offsets count characters
/// in the original text; because chunk text is trimmed before recording,
/// `end_offset - start_offset` need not equal the text length.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub text: String,
    pub index: usize,
    pub start_offset: usize,
    pub end_offset: usize,
}

/// Payload stored alongside every chunk vector.
///
/// `index_folder` is the folder at which indexing was *triggered* and may be
/// an ancestor of `folder_path` (the file's immediate parent). Folder-scoped
/// deletion and the disable mechanism key off `index_folder`.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkMetadata {
    pub file_path: String,
    pub folder_path: String,
    pub index_folder: String,
    pub file_name: String,
    pub chunk_index: i64,
    pub total_chunks: i64,
    pub start_char: i64,
    pub end_char: i64,
    pub indexed_at: i64,
    pub page_range: Option<String>,
}

/// A chunk as read back from the vector store.
#[derive(Debug, Clone)]
pub struct StoredChunk {
    pub id: String,
    pub text: String,
    /// Relevance score; present only on search results.
    pub score: Option<f64>,
    pub metadata: ChunkMetadata,
}

/// Per-file index record, unique on `file_path`.
///
/// `chunk_count == 0` means the file is not indexed even if the row exists.
#[derive(Debug, Clone)]
pub struct IndexedFile {
    pub file_path: String,
    pub folder_path: String,
    pub index_folder: String,
    pub content_hash: String,
    pub file_size: i64,
    pub chunk_count: i64,
    pub indexed_at: i64,
    pub updated_at: i64,
}

/// Lifecycle state of a registered index folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexState {
    None,
    Pending,
    Indexing,
    Indexed,
    Disabled,
    Error,
}

impl IndexState {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexState::None => "none",
            IndexState::Pending => "pending",
            IndexState::Indexing => "indexing",
            IndexState::Indexed => "indexed",
            IndexState::Disabled => "disabled",
            IndexState::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<IndexState> {
        match s {
            "none" => Some(IndexState::None),
            "pending" => Some(IndexState::Pending),
            "indexing" => Some(IndexState::Indexing),
            "indexed" => Some(IndexState::Indexed),
            "disabled" => Some(IndexState::Disabled),
            "error" => Some(IndexState::Error),
            _ => None,
        }
    }
}

impl std::fmt::Display for IndexState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status row for a folder at which indexing was triggered.
#[derive(Debug, Clone)]
pub struct FolderStatus {
    pub folder_path: String,
    pub state: IndexState,
    pub error_message: Option<String>,
    pub indexed_at: Option<i64>,
}

/// Result of a single `index_file` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexOutcome {
    pub was_indexed: bool,
    pub chunk_count: i64,
}

/// Counters from one `index_folder` run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FolderSummary {
    pub files_indexed: u64,
    pub total_chunks: u64,
    pub files_skipped: u64,
}

/// Counters from one `sync_folder` reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncSummary {
    pub added: u64,
    pub removed: u64,
    pub unchanged: u64,
}
