//! Concurrent directory walker
//!
//! Traverses a storage tree with N worker threads and produces a bounded,
//! finite, non-restartable stream of filtered entries.
//!
//! # Architecture
//!
//! ```text
//!                  ┌──────────────────────────┐
//!                  │     directory queue      │
//!                  │  (bounded, counter-close)│
//!                  └─────┬──────┬──────┬──────┘
//!                        │      │      │
//!                  ┌─────▼──┐ ┌─▼────┐ ┌▼─────┐
//!                  │Worker 1│ │Wkr 2 │ │Wkr N │   list + filter,
//!                  │        │ │      │ │      │   re-enqueue subdirs
//!                  └─────┬──┘ └─┬────┘ └┬─────┘
//!                        │      │       │
//!                  ┌─────▼──────▼───────▼─────┐
//!                  │      entry channel       │
//!                  │     (bounded, 8192)      │
//!                  └──────────────────────────┘
//! ```
//!
//! No ordering is guaranteed across workers. A directory that fails to
//! list is logged and skipped; the scan continues.

mod queue;
mod worker;

pub use queue::{DirQueue, DirTask};

use crate::config::CancelToken;
use crate::error::{Result, WorkerError};
use crate::filter::ConditionFilter;
use crate::storage::{Entry, Storage};
use crossbeam_channel::{bounded, Receiver};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{info, warn};
use worker::WorkerCtx;

/// Directory queue capacity
pub const DIR_QUEUE_LEN: usize = 1024;

/// Entry (result) channel capacity
pub const ENTRY_QUEUE_LEN: usize = 8192;

/// Walker tuning and filters
#[derive(Clone)]
pub struct WalkOptions {
    pub concurrency: usize,
    /// 0 = unlimited; D > 0 lists entries at depths 1..=D
    pub depth: usize,
    pub match_filter: Arc<ConditionFilter>,
    pub exclude_filter: Arc<ConditionFilter>,
}

/// Handle over the running walk; the entry stream closes once every
/// worker has exited.
pub struct Walker {
    handles: Vec<JoinHandle<()>>,
}

impl Walker {
    /// Start the walk rooted at `/` and return the bounded entry stream
    pub fn start(
        storage: Arc<dyn Storage>,
        options: WalkOptions,
        cancel: CancelToken,
    ) -> Result<(Self, Receiver<Entry>)> {
        let queue = Arc::new(DirQueue::new(DIR_QUEUE_LEN));
        let (entry_tx, entry_rx) = bounded(ENTRY_QUEUE_LEN);

        queue.seed(DirTask {
            path: "/".to_string(),
            depth: 1,
        });

        let concurrency = options.concurrency.max(1);
        let mut handles = Vec::with_capacity(concurrency);
        for id in 0..concurrency {
            let ctx = WorkerCtx {
                id,
                storage: Arc::clone(&storage),
                queue: Arc::clone(&queue),
                results: entry_tx.clone(),
                match_filter: Arc::clone(&options.match_filter),
                exclude_filter: Arc::clone(&options.exclude_filter),
                depth_cap: options.depth,
                cancel: cancel.clone(),
            };
            let handle = thread::Builder::new()
                .name(format!("walker-{}", id))
                .spawn(move || ctx.run())
                .map_err(|e| WorkerError::InitFailed {
                    id,
                    reason: e.to_string(),
                })?;
            handles.push(handle);
        }
        drop(entry_tx);

        info!(workers = concurrency, depth = options.depth, "walk started");
        Ok((Self { handles }, entry_rx))
    }

    /// Wait for every worker to exit
    pub fn join(self) {
        for handle in self.handles {
            if handle.join().is_err() {
                warn!("walker thread panicked");
            }
        }
    }
}
