//! Background worker that drives pending folders through indexing.
//!
//! A single loop polls for folders whose status is `pending` and indexes
//! them one at a time. One folder's failure is recorded and broadcast, then
//! the loop moves on. Stopping is cooperative: the signal interrupts the
//! poll wait and takes effect between folders, never mid-folder.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::events::{EventBus, IndexEvent};
use crate::indexer::Indexer;

pub struct Worker {
    indexer: Arc<Indexer>,
    bus: EventBus,
    poll_interval: Duration,
}

/// Control handle for a spawned worker.
pub struct WorkerHandle {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl WorkerHandle {
    /// Ask the worker to stop after the folder it is currently processing.
    pub fn stop(&self) {
        let _ = self.stop.send(true);
    }

    /// Wait for the loop to exit.
    pub async fn join(self) {
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "worker task failed");
        }
    }
}

impl Worker {
    pub fn new(indexer: Arc<Indexer>, bus: EventBus, poll_interval: Duration) -> Worker {
        Worker {
            indexer,
            bus,
            poll_interval,
        }
    }

    pub fn spawn(self) -> WorkerHandle {
        let (stop_tx, stop_rx) = watch::channel(false);
        let task = tokio::spawn(self.run(stop_rx));
        WorkerHandle {
            stop: stop_tx,
            task,
        }
    }

    async fn run(self, mut stop: watch::Receiver<bool>) {
        tracing::info!(interval_secs = self.poll_interval.as_secs(), "worker started");
        let mut interval = tokio::time::interval(self.poll_interval);

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                changed = stop.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
            if *stop.borrow() {
                break;
            }

            self.process_pending(&stop).await;

            if *stop.borrow() {
                break;
            }
        }

        tracing::info!("worker stopped");
    }

    async fn process_pending(&self, stop: &watch::Receiver<bool>) {
        let folders = match self.indexer.pending_folders().await {
            Ok(folders) => folders,
            Err(e) => {
                tracing::error!(error = %format!("{:#}", e), "failed to query pending folders");
                return;
            }
        };

        for folder in folders {
            if *stop.borrow() {
                return;
            }
            self.process_folder(&folder).await;
        }
    }

    /// Index one pending folder. Never propagates: errors land in the
    /// folder's status row and on the event bus.
    async fn process_folder(&self, folder: &str) {
        self.bus.publish(IndexEvent::IndexingStarted {
            folder: folder.to_string(),
        });

        match self.indexer.index_folder(Path::new(folder), false).await {
            Ok(summary) => {
                self.bus.publish(IndexEvent::IndexingComplete {
                    folder: folder.to_string(),
                    files_indexed: summary.files_indexed,
                    total_chunks: summary.total_chunks,
                    files_skipped: summary.files_skipped,
                });
            }
            Err(e) => {
                let message = format!("{:#}", e);
                tracing::error!(folder, error = %message, "indexing failed");
                self.bus.publish(IndexEvent::IndexingFailed {
                    folder: folder.to_string(),
                    message,
                });
            }
        }
    }
}
