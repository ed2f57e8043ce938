//! Directory work queue with counter-driven close
//!
//! The walk is done when the pending-directory counter returns to zero.
//! The counter is incremented *before* a subdirectory task is released to
//! the queue, so it can never transiently read zero while work is still
//! in flight; the worker that decrements it to zero disconnects the
//! channel and every blocked receiver wakes up and exits.

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// A directory waiting to be listed. Depth 1 is a direct child of the
/// scan root.
#[derive(Debug, Clone)]
pub struct DirTask {
    pub path: String,
    pub depth: usize,
}

/// Outcome of a non-blocking push
pub enum Push {
    Queued,
    /// Queue full - the caller processes the task inline instead
    Full(DirTask),
    Closed,
}

/// Outcome of a timed receive
pub enum Poll {
    Task(DirTask),
    Empty,
    Closed,
}

pub struct DirQueue {
    tx: Mutex<Option<Sender<DirTask>>>,
    rx: Receiver<DirTask>,
    pending: AtomicI64,
}

impl DirQueue {
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = bounded(capacity);
        Self {
            tx: Mutex::new(Some(tx)),
            rx,
            pending: AtomicI64::new(0),
        }
    }

    /// Inject the root task with the counter at one
    pub fn seed(&self, task: DirTask) {
        self.pending.store(1, Ordering::SeqCst);
        let guard = self.tx.lock().expect("dir queue sender poisoned");
        if let Some(tx) = guard.as_ref() {
            // The root always fits: the queue is empty at seed time
            let _ = tx.try_send(task);
        }
    }

    /// Account for one more outstanding directory. Must be called before
    /// the matching task is pushed or processed inline.
    pub fn begin_task(&self) {
        self.pending.fetch_add(1, Ordering::SeqCst);
    }

    /// Mark one outstanding directory as done; the last one closes the
    /// queue.
    pub fn finish_task(&self) {
        if self.pending.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.tx.lock().expect("dir queue sender poisoned").take();
        }
    }

    /// Non-blocking push; never blocks while holding the sender lock
    pub fn try_push(&self, task: DirTask) -> Push {
        let guard = self.tx.lock().expect("dir queue sender poisoned");
        match guard.as_ref() {
            Some(tx) => match tx.try_send(task) {
                Ok(()) => Push::Queued,
                Err(TrySendError::Full(task)) => Push::Full(task),
                Err(TrySendError::Disconnected(_)) => Push::Closed,
            },
            None => Push::Closed,
        }
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Poll {
        match self.rx.recv_timeout(timeout) {
            Ok(task) => Poll::Task(task),
            Err(RecvTimeoutError::Timeout) => Poll::Empty,
            Err(RecvTimeoutError::Disconnected) => Poll::Closed,
        }
    }

    pub fn pending(&self) -> i64 {
        self.pending.load(Ordering::SeqCst)
    }
}

/// RAII guard balancing one `begin_task` (or the seed) with a
/// `finish_task`, so a panicking worker cannot leak the counter and hang
/// the other workers on a queue that never closes.
pub struct TaskGuard<'a> {
    queue: &'a DirQueue,
}

impl<'a> TaskGuard<'a> {
    pub fn new(queue: &'a DirQueue) -> Self {
        Self { queue }
    }
}

impl Drop for TaskGuard<'_> {
    fn drop(&mut self) {
        self.queue.finish_task();
    }
}
