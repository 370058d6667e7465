//! Long-running mode: watcher plus worker over one shared index.
//!
//! The daemon queues the watch root at startup, then lets the watcher's
//! invalidations and the worker's polling keep the index current until
//! Ctrl-C. Shutdown is cooperative with a bounded grace period.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tokio::sync::{broadcast, watch};

use crate::config::Config;
use crate::db;
use crate::events::{EventBus, FsEventKind, IndexEvent};
use crate::indexer::{path_str, Indexer};
use crate::watcher::{FileWatcher, PathSuppressor};
use crate::worker::Worker;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

pub async fn run_watch(config: &Config, root: Option<PathBuf>) -> Result<()> {
    let root = match root.or_else(|| config.watcher.root.clone()) {
        Some(r) => r,
        None => bail!("no watch root configured; pass a folder or set [watcher] root"),
    };
    let root = std::fs::canonicalize(&root)
        .with_context(|| format!("watch root not found: {}", root.display()))?;

    let pool = db::connect(config).await?;
    let indexer = Arc::new(Indexer::new(pool.clone(), config)?);
    let bus = EventBus::default();
    let suppressor = PathSuppressor::new();

    // The database may live inside the watched tree; mute its files so the
    // watcher never chases our own writes.
    let mut guards = Vec::new();
    if config.db.path.starts_with(&root) {
        for suffix in ["", "-wal", "-shm"] {
            let mut file = config.db.path.as_os_str().to_owned();
            file.push(suffix);
            guards.push(suppressor.suppress(Path::new(&file)));
        }
    }

    // Queue the root so the first worker pass brings the index up to date.
    indexer.mark_pending(&path_str(&root)).await?;

    let (stop_tx, stop_rx) = watch::channel(false);

    let watcher = FileWatcher::new(
        &root,
        Arc::clone(&indexer),
        bus.clone(),
        suppressor.clone(),
        config.watcher.debounce_ms,
    )?;
    let watcher_task = tokio::spawn(watcher.run(stop_rx));

    let worker = Worker::new(
        Arc::clone(&indexer),
        bus.clone(),
        Duration::from_secs(config.worker.poll_interval_secs),
    );
    let worker_handle = worker.spawn();

    let mut events = bus.subscribe();
    let log_task = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => log_event(&event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "event log fell behind");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    println!("watching {} (press Ctrl-C to stop)", root.display());
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    println!("shutting down");

    let _ = stop_tx.send(true);
    worker_handle.stop();

    let joined = tokio::time::timeout(SHUTDOWN_GRACE, async {
        let _ = watcher_task.await;
        worker_handle.join().await;
    })
    .await;
    if joined.is_err() {
        tracing::warn!("shutdown grace period expired");
    }
    log_task.abort();

    drop(guards);
    pool.close().await;
    Ok(())
}

fn log_event(event: &IndexEvent) {
    match event {
        IndexEvent::Fs(fs) => {
            let kind = match fs.kind {
                FsEventKind::Created => "created",
                FsEventKind::Deleted => "deleted",
                FsEventKind::Modified => "modified",
                FsEventKind::Moved => "moved",
            };
            match &fs.dest {
                Some(dest) => tracing::debug!(
                    kind,
                    path = %fs.path.display(),
                    dest = %dest.display(),
                    "filesystem event"
                ),
                None => tracing::debug!(kind, path = %fs.path.display(), "filesystem event"),
            }
        }
        IndexEvent::IndexingStarted { folder } => {
            println!("indexing {}", folder);
        }
        IndexEvent::IndexingComplete {
            folder,
            files_indexed,
            total_chunks,
            files_skipped,
        } => {
            println!(
                "indexed {} ({} files, {} chunks, {} skipped)",
                folder, files_indexed, total_chunks, files_skipped
            );
        }
        IndexEvent::IndexingFailed { folder, message } => {
            eprintln!("indexing failed for {}: {}", folder, message);
        }
    }
}
