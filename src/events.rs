//! Broadcast channel shared by the watcher, the worker, and any listeners.
//!
//! Publishing never blocks: the channel keeps a bounded ring per subscriber
//! and a subscriber that falls behind loses the oldest events rather than
//! stalling the sender. Index correctness never depends on delivery; the
//! bus only carries notifications.

use std::path::PathBuf;

use tokio::sync::broadcast;

const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsEventKind {
    Created,
    Deleted,
    Modified,
    Moved,
}

/// One observed filesystem mutation. `dest` is set for moves only;
/// `is_dir` is best-effort (a removed path can no longer be stat'd) and
/// index cleanup does not depend on it.
#[derive(Debug, Clone)]
pub struct FsEvent {
    pub kind: FsEventKind,
    pub path: PathBuf,
    pub is_dir: bool,
    pub dest: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub enum IndexEvent {
    Fs(FsEvent),
    IndexingStarted {
        folder: String,
    },
    IndexingComplete {
        folder: String,
        files_indexed: u64,
        total_chunks: u64,
        files_skipped: u64,
    },
    IndexingFailed {
        folder: String,
        message: String,
    },
}

#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<IndexEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        EventBus { sender }
    }

    /// Send an event to all subscribers. Having no subscribers is fine.
    pub fn publish(&self, event: IndexEvent) {
        match self.sender.send(event) {
            Ok(count) => tracing::debug!(subscribers = count, "event published"),
            Err(_) => tracing::trace!("event dropped, no subscribers"),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<IndexEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        EventBus::new(DEFAULT_CAPACITY)
    }
}
