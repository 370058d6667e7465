//! Library-level tests driving the indexer, store, worker, and search
//! engine directly against a temporary database.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use sqlx::SqlitePool;
use tempfile::TempDir;

use resift::config::Config;
use resift::db;
use resift::events::{EventBus, IndexEvent};
use resift::get::get_chunks;
use resift::indexer::Indexer;
use resift::migrate;
use resift::models::{IndexState, SyncSummary};
use resift::search::{search_chunks, SearchOptions};
use resift::store::{merge_chunk_texts, VectorStore};
use resift::worker::Worker;

fn build_config(
    root: &Path,
    chunk_size: usize,
    chunk_overlap: usize,
    strategy: &str,
    sparse: &str,
) -> Config {
    let toml_src = format!(
        r#"[db]
path = "{root}/resift.sqlite"

[chunking]
chunk_size = {chunk_size}
chunk_overlap = {chunk_overlap}
strategy = "{strategy}"

[embedding]
provider = "hash"
dims = 64

[sparse]
provider = "{sparse}"
"#,
        root = root.display(),
    );
    toml::from_str(&toml_src).unwrap()
}

fn test_config(root: &Path) -> Config {
    build_config(root, 200, 40, "recursive", "hash")
}

async fn setup_pool(config: &Config) -> SqlitePool {
    let pool = db::connect(config).await.unwrap();
    migrate::run_migrations_on(&pool).await.unwrap();
    pool
}

fn make_docs(root: &Path, files: &[(&str, &str)]) -> PathBuf {
    let docs = root.join("docs");
    fs::create_dir_all(&docs).unwrap();
    for (name, body) in files {
        fs::write(docs.join(name), body).unwrap();
    }
    docs
}

#[tokio::test]
async fn test_index_file_skips_unchanged_hash() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().canonicalize().unwrap();
    let config = test_config(&root);
    let pool = setup_pool(&config).await;
    let docs = make_docs(&root, &[("note.md", "A note about lifetimes and borrowing.")]);
    let file = docs.join("note.md");
    let folder = docs.to_str().unwrap().to_string();

    let indexer = Indexer::new(pool.clone(), &config).unwrap();

    let first = indexer.index_file(&file, &folder, false).await.unwrap();
    assert!(first.was_indexed);
    assert!(first.chunk_count > 0);

    let second = indexer.index_file(&file, &folder, false).await.unwrap();
    assert!(!second.was_indexed, "same bytes should skip on hash");
    assert_eq!(second.chunk_count, first.chunk_count);

    // Skipping never duplicates stored chunks
    let store = VectorStore::new(pool.clone());
    let stored = store.count_by_file(file.to_str().unwrap()).await.unwrap();
    assert_eq!(stored, first.chunk_count);

    // Force bypasses the hash check
    let forced = indexer.index_file(&file, &folder, true).await.unwrap();
    assert!(forced.was_indexed);
    let stored = store.count_by_file(file.to_str().unwrap()).await.unwrap();
    assert_eq!(stored, first.chunk_count);
}

#[tokio::test]
async fn test_index_file_reindexes_on_content_change() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().canonicalize().unwrap();
    let config = test_config(&root);
    let pool = setup_pool(&config).await;
    let docs = make_docs(&root, &[("note.md", "Original text about iterators.")]);
    let file = docs.join("note.md");
    let folder = docs.to_str().unwrap().to_string();

    let indexer = Indexer::new(pool.clone(), &config).unwrap();
    indexer.index_file(&file, &folder, false).await.unwrap();

    fs::write(&file, "Rewritten text about adapters, closures, and captures.").unwrap();
    let outcome = indexer.index_file(&file, &folder, false).await.unwrap();
    assert!(outcome.was_indexed, "changed bytes must re-index");

    let store = VectorStore::new(pool.clone());
    let chunks = store
        .chunks_by_range(file.to_str().unwrap(), 0, i64::MAX)
        .await
        .unwrap();
    assert!(chunks.iter().all(|c| c.text.contains("Rewritten")));
}

#[tokio::test]
async fn test_index_folder_sets_status_and_counts() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().canonicalize().unwrap();
    let config = test_config(&root);
    let pool = setup_pool(&config).await;
    let docs = make_docs(
        &root,
        &[
            ("a.md", "Alpha document about parsers."),
            ("b.txt", "Beta document about lexers."),
        ],
    );
    let folder = docs.to_str().unwrap().to_string();

    let indexer = Indexer::new(pool.clone(), &config).unwrap();
    let summary = indexer.index_folder(&docs, false).await.unwrap();
    assert_eq!(summary.files_indexed, 2);
    assert!(summary.total_chunks >= 2);
    assert_eq!(summary.files_skipped, 0);

    let status = indexer.folder_status(&folder).await.unwrap().unwrap();
    assert_eq!(status.state, IndexState::Indexed);
    assert!(status.indexed_at.is_some());
    assert!(status.error_message.is_none());
}

#[tokio::test]
async fn test_index_folder_on_file_records_error() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().canonicalize().unwrap();
    let config = test_config(&root);
    let pool = setup_pool(&config).await;
    let docs = make_docs(&root, &[("only.md", "Not a folder.")]);
    let file = docs.join("only.md");

    let indexer = Indexer::new(pool.clone(), &config).unwrap();
    let result = indexer.index_folder(&file, false).await;
    assert!(result.is_err());

    let status = indexer
        .folder_status(file.to_str().unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(status.state, IndexState::Error);
    assert!(status.error_message.unwrap().contains("not a directory"));
}

#[tokio::test]
async fn test_sync_folder_reconciles_disk_state() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().canonicalize().unwrap();
    let config = test_config(&root);
    let pool = setup_pool(&config).await;
    let docs = make_docs(
        &root,
        &[
            ("alpha.md", "Alpha stays the same."),
            ("beta.md", "Beta will be deleted."),
            ("gamma.md", "Gamma will be rewritten."),
        ],
    );
    let folder = docs.to_str().unwrap().to_string();

    let indexer = Indexer::new(pool.clone(), &config).unwrap();
    indexer.index_folder(&docs, false).await.unwrap();

    fs::remove_file(docs.join("beta.md")).unwrap();
    fs::write(docs.join("gamma.md"), "Gamma was rewritten after indexing.").unwrap();
    fs::write(docs.join("delta.md"), "Delta is brand new.").unwrap();

    let summary = indexer.sync_folder(&docs).await.unwrap();
    assert_eq!(
        summary,
        SyncSummary {
            added: 2,
            removed: 1,
            unchanged: 1,
        }
    );

    let beta = docs.join("beta.md");
    let records: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM indexed_files WHERE file_path = ?")
        .bind(beta.to_str().unwrap())
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(records, 0, "stale record must be removed");

    let store = VectorStore::new(pool.clone());
    assert_eq!(store.count_by_file(beta.to_str().unwrap()).await.unwrap(), 0);

    let status = indexer.folder_status(&folder).await.unwrap().unwrap();
    assert_eq!(status.state, IndexState::Indexed);
}

#[tokio::test]
async fn test_remove_path_file_clears_record_and_chunks() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().canonicalize().unwrap();
    let config = test_config(&root);
    let pool = setup_pool(&config).await;
    let docs = make_docs(&root, &[("gone.md", "This file is about to vanish.")]);
    let file = docs.join("gone.md");
    let file_str = file.to_str().unwrap();

    let indexer = Indexer::new(pool.clone(), &config).unwrap();
    indexer.index_folder(&docs, false).await.unwrap();

    let store = VectorStore::new(pool.clone());
    assert!(store.count_by_file(file_str).await.unwrap() > 0);

    let removed = indexer.remove_path(file_str).await.unwrap();
    assert!(removed > 0);
    assert_eq!(store.count_by_file(file_str).await.unwrap(), 0);

    let records: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM indexed_files WHERE file_path = ?")
        .bind(file_str)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(records, 0);
}

#[tokio::test]
async fn test_remove_path_directory_drops_folder_state() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().canonicalize().unwrap();
    let config = test_config(&root);
    let pool = setup_pool(&config).await;
    let docs = make_docs(
        &root,
        &[("x.md", "First file."), ("y.md", "Second file.")],
    );
    let folder = docs.to_str().unwrap().to_string();

    let indexer = Indexer::new(pool.clone(), &config).unwrap();
    indexer.index_folder(&docs, false).await.unwrap();

    let removed = indexer.remove_path(&folder).await.unwrap();
    assert!(removed > 0);

    let store = VectorStore::new(pool.clone());
    for name in ["x.md", "y.md"] {
        let path = docs.join(name);
        assert_eq!(store.count_by_file(path.to_str().unwrap()).await.unwrap(), 0);
    }

    // The registration itself is gone, not just the data
    assert!(indexer.folder_status(&folder).await.unwrap().is_none());
}

#[tokio::test]
async fn test_zero_sparse_weight_matches_dense_ranking() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().canonicalize().unwrap();
    let hybrid_config = build_config(&root, 200, 40, "recursive", "hash");
    let dense_config = build_config(&root, 200, 40, "recursive", "disabled");
    let pool = setup_pool(&hybrid_config).await;
    let docs = make_docs(
        &root,
        &[
            ("a.md", "Rust ownership moves values between bindings."),
            ("b.md", "Borrow checking enforces aliasing rules at compile time."),
            ("c.md", "Garbage collectors trace live objects at runtime."),
            ("d.md", "Databases persist rows inside b-tree pages."),
            ("e.md", "Sailing upwind requires tacking through the breeze."),
        ],
    );

    let indexer = Indexer::new(pool.clone(), &hybrid_config).unwrap();
    indexer.index_folder(&docs, false).await.unwrap();

    let opts = SearchOptions {
        limit: 3,
        sparse_weight: 0.0,
        ..Default::default()
    };
    let fused = search_chunks(&pool, &hybrid_config, "rust ownership", &opts)
        .await
        .unwrap();
    let dense_only = search_chunks(&pool, &dense_config, "rust ownership", &opts)
        .await
        .unwrap();

    let fused_order: Vec<(String, i64)> = fused
        .iter()
        .map(|c| (c.metadata.file_path.clone(), c.metadata.chunk_index))
        .collect();
    let dense_order: Vec<(String, i64)> = dense_only
        .iter()
        .map(|c| (c.metadata.file_path.clone(), c.metadata.chunk_index))
        .collect();
    assert_eq!(
        fused_order, dense_order,
        "weight 0.0 must rank exactly like pure dense retrieval"
    );
    assert!(!fused_order.is_empty());
}

#[tokio::test]
async fn test_disable_excludes_folder_but_keeps_chunks() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().canonicalize().unwrap();
    let config = test_config(&root);
    let pool = setup_pool(&config).await;

    let climbing = root.join("climbing");
    let skiing = root.join("skiing");
    fs::create_dir_all(&climbing).unwrap();
    fs::create_dir_all(&skiing).unwrap();
    fs::write(
        climbing.join("rope.md"),
        "Alpine climbing uses rope and knots for safety.",
    )
    .unwrap();
    fs::write(
        skiing.join("snow.md"),
        "Alpine skiing needs snow and sharp edges.",
    )
    .unwrap();
    let climbing_str = climbing.to_str().unwrap().to_string();

    let indexer = Indexer::new(pool.clone(), &config).unwrap();
    indexer.index_folder(&climbing, false).await.unwrap();
    indexer.index_folder(&skiing, false).await.unwrap();

    let opts = SearchOptions {
        limit: 10,
        sparse_weight: 0.4,
        ..Default::default()
    };
    let results = search_chunks(&pool, &config, "alpine rope safety", &opts)
        .await
        .unwrap();
    assert!(results
        .iter()
        .any(|c| c.metadata.index_folder == climbing_str));

    assert!(indexer.disable_folder(&climbing_str).await.unwrap());
    let results = search_chunks(&pool, &config, "alpine rope safety", &opts)
        .await
        .unwrap();
    assert!(
        results.iter().all(|c| c.metadata.index_folder != climbing_str),
        "disabled folder leaked into results"
    );
    assert!(!results.is_empty(), "other folders still searchable");

    // Data survives the disable untouched
    let rope = climbing.join("rope.md");
    let store = VectorStore::new(pool.clone());
    assert!(store.count_by_file(rope.to_str().unwrap()).await.unwrap() > 0);

    assert!(indexer.enable_folder(&climbing_str).await.unwrap());
    let results = search_chunks(&pool, &config, "alpine rope safety", &opts)
        .await
        .unwrap();
    assert!(results
        .iter()
        .any(|c| c.metadata.index_folder == climbing_str));
}

#[tokio::test]
async fn test_invalidation_targets_deepest_registered_folder() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().canonicalize().unwrap();
    let config = test_config(&root);
    let pool = setup_pool(&config).await;

    let parent = root.join("notes");
    let child = parent.join("work");
    fs::create_dir_all(&child).unwrap();
    fs::write(parent.join("top.md"), "Top-level note.").unwrap();
    fs::write(child.join("deep.md"), "Nested note.").unwrap();
    let parent_str = parent.to_str().unwrap().to_string();
    let child_str = child.to_str().unwrap().to_string();

    let indexer = Indexer::new(pool.clone(), &config).unwrap();
    indexer.index_folder(&parent, false).await.unwrap();
    indexer.index_folder(&child, false).await.unwrap();

    let deep_file = child.join("deep.md");
    let marked = indexer
        .invalidate_containing_folder(deep_file.to_str().unwrap())
        .await
        .unwrap();
    assert_eq!(marked.as_deref(), Some(child_str.as_str()));

    let child_status = indexer.folder_status(&child_str).await.unwrap().unwrap();
    assert_eq!(child_status.state, IndexState::Pending);
    let parent_status = indexer.folder_status(&parent_str).await.unwrap().unwrap();
    assert_eq!(parent_status.state, IndexState::Indexed);

    // With the child disabled, the parent is the deepest eligible match
    indexer.index_folder(&child, false).await.unwrap();
    assert!(indexer.disable_folder(&child_str).await.unwrap());
    let marked = indexer
        .invalidate_containing_folder(deep_file.to_str().unwrap())
        .await
        .unwrap();
    assert_eq!(marked.as_deref(), Some(parent_str.as_str()));

    let child_status = indexer.folder_status(&child_str).await.unwrap().unwrap();
    assert_eq!(child_status.state, IndexState::Disabled);
    let parent_status = indexer.folder_status(&parent_str).await.unwrap().unwrap();
    assert_eq!(parent_status.state, IndexState::Pending);
}

#[tokio::test]
async fn test_worker_indexes_pending_folder() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().canonicalize().unwrap();
    let config = test_config(&root);
    let pool = setup_pool(&config).await;
    let docs = make_docs(&root, &[("queued.md", "Indexed by the background worker.")]);
    let folder = docs.to_str().unwrap().to_string();

    let indexer = Arc::new(Indexer::new(pool.clone(), &config).unwrap());
    indexer.mark_pending(&folder).await.unwrap();

    let bus = EventBus::default();
    let mut rx = bus.subscribe();
    let handle = Worker::new(indexer.clone(), bus.clone(), Duration::from_millis(25)).spawn();

    let waited = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match rx.recv().await {
                Ok(IndexEvent::IndexingComplete {
                    folder: done,
                    files_indexed,
                    ..
                }) => {
                    assert_eq!(done, folder);
                    assert_eq!(files_indexed, 1);
                    break;
                }
                Ok(IndexEvent::IndexingFailed { message, .. }) => {
                    panic!("worker failed the folder: {}", message);
                }
                Ok(_) => {}
                Err(e) => panic!("event bus closed early: {}", e),
            }
        }
    })
    .await;
    assert!(waited.is_ok(), "worker never completed the pending folder");

    handle.stop();
    handle.join().await;

    let status = indexer.folder_status(&folder).await.unwrap().unwrap();
    assert_eq!(status.state, IndexState::Indexed);

    let store = VectorStore::new(pool.clone());
    let file = docs.join("queued.md");
    assert!(store.count_by_file(file.to_str().unwrap()).await.unwrap() > 0);
}

#[tokio::test]
async fn test_fixed_chunking_offsets_and_merge_round_trip() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().canonicalize().unwrap();
    let config = build_config(&root, 100, 20, "fixed", "hash");
    let pool = setup_pool(&config).await;

    let text = "abcdefghij".repeat(25); // 250 characters
    let docs = make_docs(&root, &[("fixed.txt", text.as_str())]);
    let file = docs.join("fixed.txt");
    let file_str = file.to_str().unwrap();
    let folder = docs.to_str().unwrap().to_string();

    let indexer = Indexer::new(pool.clone(), &config).unwrap();
    let outcome = indexer.index_file(&file, &folder, false).await.unwrap();
    assert_eq!(outcome.chunk_count, 4);

    let result = get_chunks(&pool, file_str, None, None).await.unwrap();
    assert_eq!(result.total_chunks, 4);
    let starts: Vec<i64> = result.chunks.iter().map(|c| c.metadata.start_char).collect();
    assert_eq!(starts, vec![0, 80, 160, 240]);

    let merged = merge_chunk_texts(&result.chunks, config.chunking.chunk_overlap);
    assert_eq!(merged, text, "overlap stripping must reassemble the file");
}

#[tokio::test]
async fn test_get_range_clamps_out_of_bounds() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().canonicalize().unwrap();
    let config = build_config(&root, 100, 20, "fixed", "hash");
    let pool = setup_pool(&config).await;

    let text = "abcdefghij".repeat(25);
    let docs = make_docs(&root, &[("fixed.txt", text.as_str())]);
    let file = docs.join("fixed.txt");
    let file_str = file.to_str().unwrap();
    let folder = docs.to_str().unwrap().to_string();

    let indexer = Indexer::new(pool.clone(), &config).unwrap();
    indexer.index_file(&file, &folder, false).await.unwrap();

    let ranged = get_chunks(&pool, file_str, Some(1), Some(99)).await.unwrap();
    assert_eq!(ranged.chunks.len(), 3);
    assert_eq!(ranged.chunks[0].metadata.chunk_index, 1);

    let clamped = get_chunks(&pool, file_str, Some(-5), Some(0)).await.unwrap();
    assert_eq!(clamped.chunks.len(), 1);
    assert_eq!(clamped.chunks[0].metadata.chunk_index, 0);

    let missing = get_chunks(&pool, "/nowhere/else.md", None, None).await;
    assert!(missing.is_err());
}

#[tokio::test]
async fn test_parse_failure_keeps_prior_index() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().canonicalize().unwrap();
    let config = test_config(&root);
    let pool = setup_pool(&config).await;
    let docs = make_docs(&root, &[("doc.md", "Healthy original content.")]);
    let file = docs.join("doc.md");
    let file_str = file.to_str().unwrap();
    let folder = docs.to_str().unwrap().to_string();

    let indexer = Indexer::new(pool.clone(), &config).unwrap();
    let original = indexer.index_file(&file, &folder, false).await.unwrap();
    assert!(original.was_indexed);

    // Invalid UTF-8: parsing fails, the old index must survive
    fs::write(&file, [0xff, 0xfe, 0x00, 0x9f]).unwrap();
    let outcome = indexer.index_file(&file, &folder, false).await.unwrap();
    assert!(!outcome.was_indexed);
    assert_eq!(outcome.chunk_count, original.chunk_count);

    let store = VectorStore::new(pool.clone());
    assert_eq!(
        store.count_by_file(file_str).await.unwrap(),
        original.chunk_count
    );

    // Empty content parses but yields nothing; same skip contract
    fs::write(&file, "").unwrap();
    let outcome = indexer.index_file(&file, &folder, false).await.unwrap();
    assert!(!outcome.was_indexed);
    assert_eq!(
        store.count_by_file(file_str).await.unwrap(),
        original.chunk_count
    );
}
