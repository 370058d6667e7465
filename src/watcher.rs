//! Filesystem watcher for the managed root.
//!
//! Bridges notify's callback thread into the async runtime over a bounded
//! channel, coalesces save bursts with a debouncer, and turns surviving
//! mutations into index work: deletions are applied to the index inline
//! before their event reaches any subscriber, creations and modifications
//! mark the containing index folder pending for the worker.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use notify::event::{CreateKind, ModifyKind, RemoveKind, RenameMode};
use notify::{Event, EventKind, RecursiveMode, Watcher};
use tokio::sync::{mpsc, watch};

use crate::events::{EventBus, FsEvent, FsEventKind, IndexEvent};
use crate::indexer::{path_str, Indexer};

/// Debounces change events by path.
///
/// Each recorded change resets the path's timer; `take_ready` hands back
/// paths that have stayed quiet for the configured window.
#[derive(Debug)]
pub struct Debouncer {
    pending: HashMap<PathBuf, Instant>,
    window: Duration,
}

impl Debouncer {
    pub fn new(debounce_ms: u64) -> Self {
        Debouncer {
            pending: HashMap::new(),
            window: Duration::from_millis(debounce_ms),
        }
    }

    pub fn record(&mut self, path: PathBuf) {
        self.pending.insert(path, Instant::now());
    }

    pub fn remove(&mut self, path: &Path) {
        self.pending.remove(path);
    }

    /// Paths quiet for at least the debounce window, removed from pending.
    pub fn take_ready(&mut self) -> Vec<PathBuf> {
        let now = Instant::now();
        let mut ready = Vec::new();
        self.pending.retain(|path, last_change| {
            if now.duration_since(*last_change) >= self.window {
                ready.push(path.clone());
                false
            } else {
                true
            }
        });
        ready
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}

/// Shared mute list for watcher events.
///
/// Bulk operations suppress their subtree for the duration so the watcher
/// does not chase self-inflicted events. Unsuppression is tied to guard
/// drop and therefore happens on every exit path, panics included.
#[derive(Clone, Default)]
pub struct PathSuppressor {
    inner: Arc<Mutex<HashMap<PathBuf, usize>>>,
}

impl PathSuppressor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mute everything under `path` until the returned guard drops.
    pub fn suppress(&self, path: &Path) -> SuppressGuard {
        let path = path.to_path_buf();
        let mut set = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        *set.entry(path.clone()).or_insert(0) += 1;
        SuppressGuard {
            inner: Arc::clone(&self.inner),
            path,
        }
    }

    pub fn is_suppressed(&self, path: &Path) -> bool {
        let set = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        set.keys().any(|root| path.starts_with(root))
    }
}

pub struct SuppressGuard {
    inner: Arc<Mutex<HashMap<PathBuf, usize>>>,
    path: PathBuf,
}

impl Drop for SuppressGuard {
    fn drop(&mut self) {
        let mut set = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(count) = set.get_mut(&self.path) {
            *count -= 1;
            if *count == 0 {
                set.remove(&self.path);
            }
        }
    }
}

pub struct FileWatcher {
    root: PathBuf,
    indexer: Arc<Indexer>,
    bus: EventBus,
    suppressor: PathSuppressor,
    debouncer: Debouncer,
    event_rx: mpsc::Receiver<notify::Result<Event>>,
    _watcher: notify::RecommendedWatcher,
}

impl FileWatcher {
    pub fn new(
        root: &Path,
        indexer: Arc<Indexer>,
        bus: EventBus,
        suppressor: PathSuppressor,
        debounce_ms: u64,
    ) -> Result<FileWatcher> {
        let root = std::fs::canonicalize(root)
            .with_context(|| format!("watch root not found: {}", root.display()))?;

        // notify calls back from its own thread; blocking_send is the
        // only safe crossing into the async side.
        let (tx, rx) = mpsc::channel(256);
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let _ = tx.blocking_send(res);
        })?;
        watcher.watch(&root, RecursiveMode::Recursive)?;

        Ok(FileWatcher {
            root,
            indexer,
            bus,
            suppressor,
            debouncer: Debouncer::new(debounce_ms),
            event_rx: rx,
            _watcher: watcher,
        })
    }

    /// Run until `stop` fires or the notify side goes away.
    pub async fn run(mut self, mut stop: watch::Receiver<bool>) {
        tracing::info!(root = %self.root.display(), "watcher started");

        loop {
            let tick = tokio::time::sleep(Duration::from_millis(100));
            tokio::pin!(tick);

            tokio::select! {
                maybe = self.event_rx.recv() => {
                    match maybe {
                        Some(Ok(event)) => self.handle_notify_event(event).await,
                        Some(Err(e)) => tracing::error!(error = %e, "watch error"),
                        None => break,
                    }
                }
                _ = &mut tick => {
                    for path in self.debouncer.take_ready() {
                        self.handle_settled_change(&path).await;
                    }
                }
                changed = stop.changed() => {
                    if changed.is_err() || *stop.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!("watcher stopped");
    }

    async fn handle_notify_event(&mut self, event: Event) {
        for fs_event in map_event(&event) {
            if self.should_ignore(&fs_event.path) {
                continue;
            }
            match fs_event.kind {
                FsEventKind::Created | FsEventKind::Modified => {
                    self.bus.publish(IndexEvent::Fs(fs_event.clone()));
                    self.debouncer.record(fs_event.path);
                }
                FsEventKind::Deleted => {
                    self.debouncer.remove(&fs_event.path);
                    self.apply_deletion(&fs_event.path).await;
                    self.bus.publish(IndexEvent::Fs(fs_event));
                }
                FsEventKind::Moved => {
                    // The source vanishes like a deletion; the destination
                    // settles like a creation.
                    self.debouncer.remove(&fs_event.path);
                    self.apply_deletion(&fs_event.path).await;
                    if let Some(dest) = &fs_event.dest {
                        if !self.should_ignore(dest) {
                            self.debouncer.record(dest.clone());
                        }
                    }
                    self.bus.publish(IndexEvent::Fs(fs_event));
                }
            }
        }
    }

    /// A path that stayed quiet through the debounce window: queue its
    /// containing index folder, or treat it as deleted if it vanished in
    /// the meantime.
    async fn handle_settled_change(&self, path: &Path) {
        if !path.exists() {
            self.apply_deletion(path).await;
            self.bus.publish(IndexEvent::Fs(FsEvent {
                kind: FsEventKind::Deleted,
                path: path.to_path_buf(),
                is_dir: false,
                dest: None,
            }));
            return;
        }

        match self
            .indexer
            .invalidate_containing_folder(&path_str(path))
            .await
        {
            Ok(Some(folder)) => {
                tracing::debug!(path = %path.display(), folder, "queued containing index folder");
            }
            Ok(None) => {
                tracing::trace!(path = %path.display(), "no registered index folder contains path");
            }
            Err(e) => {
                tracing::error!(path = %path.display(), error = %format!("{:#}", e), "failed to queue folder");
            }
        }
    }

    /// Inline index cleanup for a deletion. Runs before the event is
    /// broadcast and never propagates a failure into the watch loop.
    async fn apply_deletion(&self, path: &Path) {
        match self.indexer.remove_path(&path_str(path)).await {
            Ok(removed) => {
                if removed > 0 {
                    tracing::info!(path = %path.display(), removed, "removed deleted path from index");
                }
            }
            Err(e) => {
                tracing::error!(path = %path.display(), error = %format!("{:#}", e), "failed to remove deleted path");
            }
        }
    }

    fn should_ignore(&self, path: &Path) -> bool {
        self.suppressor.is_suppressed(path) || is_hidden(path, &self.root)
    }
}

/// True when any component below `root` is a dot-entry.
fn is_hidden(path: &Path, root: &Path) -> bool {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components().any(|c| {
        matches!(c, Component::Normal(name) if name.to_string_lossy().starts_with('.'))
    })
}

/// Flatten one notify event into the watcher's own event shape.
///
/// Directory-level modifications are dropped as noise; renames with both
/// ends known become a single move, half-known renames degrade to a
/// deletion or creation.
fn map_event(event: &Event) -> Vec<FsEvent> {
    match &event.kind {
        EventKind::Create(kind) => event
            .paths
            .iter()
            .map(|p| FsEvent {
                kind: FsEventKind::Created,
                path: p.clone(),
                is_dir: matches!(kind, CreateKind::Folder) || p.is_dir(),
                dest: None,
            })
            .collect(),
        EventKind::Remove(kind) => event
            .paths
            .iter()
            .map(|p| FsEvent {
                kind: FsEventKind::Deleted,
                path: p.clone(),
                is_dir: matches!(kind, RemoveKind::Folder),
                dest: None,
            })
            .collect(),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) if event.paths.len() == 2 => {
            let dest = event.paths[1].clone();
            vec![FsEvent {
                kind: FsEventKind::Moved,
                path: event.paths[0].clone(),
                is_dir: dest.is_dir(),
                dest: Some(dest),
            }]
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => event
            .paths
            .iter()
            .map(|p| FsEvent {
                kind: FsEventKind::Deleted,
                path: p.clone(),
                is_dir: false,
                dest: None,
            })
            .collect(),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => event
            .paths
            .iter()
            .map(|p| FsEvent {
                kind: FsEventKind::Created,
                path: p.clone(),
                is_dir: p.is_dir(),
                dest: None,
            })
            .collect(),
        EventKind::Modify(_) => event
            .paths
            .iter()
            .filter(|p| !p.is_dir())
            .map(|p| FsEvent {
                kind: FsEventKind::Modified,
                path: p.clone(),
                is_dir: false,
                dest: None,
            })
            .collect(),
        _ => Vec::new(),
    }
}
