//! Walker worker threads
//!
//! Each worker loops: take a directory task, list its children through the
//! storage backend, push admitted entries onto the bounded result channel,
//! and enqueue child directories. When the directory queue is full the
//! worker descends into the subdirectory inline instead of blocking, which
//! keeps memory bounded without the deadlock every-worker-blocked-on-send
//! would allow.

use super::queue::{DirQueue, DirTask, Poll, Push, TaskGuard};
use crate::config::CancelToken;
use crate::filter::ConditionFilter;
use crate::storage::{Entry, Storage};
use crossbeam_channel::Sender;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// How long a worker waits on the queue before re-checking cancellation
const POLL_INTERVAL: Duration = Duration::from_millis(100);

pub(super) struct WorkerCtx {
    pub id: usize,
    pub storage: Arc<dyn Storage>,
    pub queue: Arc<DirQueue>,
    pub results: Sender<Entry>,
    pub match_filter: Arc<ConditionFilter>,
    pub exclude_filter: Arc<ConditionFilter>,
    pub depth_cap: usize,
    pub cancel: CancelToken,
}

impl WorkerCtx {
    pub fn run(&self) {
        loop {
            if self.cancel.is_cancelled() {
                debug!(worker = self.id, "cancelled, exiting");
                break;
            }
            match self.queue.recv_timeout(POLL_INTERVAL) {
                Poll::Task(task) => {
                    let _guard = TaskGuard::new(&self.queue);
                    self.process_dir(&task.path, task.depth);
                }
                Poll::Empty => continue,
                Poll::Closed => break,
            }
        }
        debug!(worker = self.id, "worker finished");
    }

    /// An entry is emitted when the match filter (empty matches all)
    /// admits it and the exclude filter (empty excludes nothing) does not
    /// veto it.
    fn admits(&self, entry: &Entry) -> bool {
        let matched = self.match_filter.is_empty() || self.match_filter.is_satisfied(entry);
        let excluded =
            !self.exclude_filter.is_empty() && self.exclude_filter.is_satisfied(entry);
        matched && !excluded
    }

    /// List one directory at `depth`, emitting children and scheduling
    /// subdirectories at `depth + 1`. Filtering never prunes traversal:
    /// a suppressed directory is still descended into.
    fn process_dir(&self, dir: &str, depth: usize) {
        let children = match self.storage.list(dir) {
            Ok(children) => children,
            Err(e) => {
                warn!(worker = self.id, path = %dir, error = %e, "listing failed, directory skipped");
                return;
            }
        };

        for child in children {
            if self.cancel.is_cancelled() {
                return;
            }

            let subdir = child.is_dir.then(|| child.key.clone());

            if self.admits(&child) {
                // A send fails only when the consumer is gone; stop early
                if self.results.send(child).is_err() {
                    debug!(worker = self.id, "result channel closed, abandoning directory");
                    return;
                }
            }

            if let Some(path) = subdir {
                if self.depth_cap == 0 || depth < self.depth_cap {
                    self.queue.begin_task();
                    match self.queue.try_push(DirTask {
                        path,
                        depth: depth + 1,
                    }) {
                        Push::Queued => {}
                        Push::Full(task) => {
                            // Backpressure: descend inline instead of blocking
                            let _guard = TaskGuard::new(&self.queue);
                            self.process_dir(&task.path, task.depth);
                        }
                        Push::Closed => self.queue.finish_task(),
                    }
                }
            }
        }
    }
}
