//! Full-scan fan-out
//!
//! Consumes the walker stream on one thread: update stats, print the
//! Found line, then fan the entry out to the batched catalog writer and
//! (when configured) the sink worker pool. Both downstream channels are
//! bounded, so a slow consumer blocks the tap and, through the entry
//! channel, the walker itself.

use super::stats::Stats;
use crate::catalog::{Catalog, CatalogRow};
use crate::config::JobContext;
use crate::error::{Result, WorkerError};
use crate::sink::Sink;
use crate::storage::Entry;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Poll interval for cancellation-aware receives
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Counters reported in the scan summary
#[derive(Debug, Default, Clone)]
pub struct DispatchOutcome {
    /// Rows committed to the catalog
    pub saved: u64,
    /// Rows lost to failed batches
    pub lost: u64,
    /// Sink messages acknowledged
    pub sink_sent: u64,
    /// Sink messages that failed after retries
    pub sink_failed: u64,
}

/// Run the full-scan dispatch to completion and hand the catalog back for
/// the summary queries.
pub fn dispatch_full_scan(
    entries: Receiver<Entry>,
    catalog: Box<dyn Catalog>,
    sink: Option<Arc<dyn Sink>>,
    stats: Arc<Stats>,
    ctx: &JobContext,
) -> Result<(Box<dyn Catalog>, DispatchOutcome)> {
    let cancel = ctx.cancel.clone();

    // Catalog writer: bounded by one batch
    let (db_tx, db_rx) = bounded::<Entry>(ctx.batch_size);
    let writer = spawn_catalog_writer(catalog, db_rx, ctx.batch_size, cancel.clone())?;

    // Sink pool: bounded by the pool size
    let sink_active = sink.is_some() && ctx.sink.is_active();
    let (sink_tx, sink_workers, sink_sent, sink_failed) = if sink_active {
        let sink = sink.expect("sink checked above");
        let (tx, rx) = bounded::<String>(ctx.sink.concurrency);
        let sent = Arc::new(AtomicU64::new(0));
        let failed = Arc::new(AtomicU64::new(0));
        let workers = spawn_sink_pool(
            sink,
            rx,
            ctx.sink.topic.clone(),
            ctx.sink.concurrency,
            Arc::clone(&sent),
            Arc::clone(&failed),
        )?;
        (Some(tx), workers, sent, failed)
    } else {
        (
            None,
            Vec::new(),
            Arc::new(AtomicU64::new(0)),
            Arc::new(AtomicU64::new(0)),
        )
    };

    let root = ctx.uri.trim_end_matches('/');
    loop {
        if cancel.is_cancelled() {
            info!("dispatch cancelled, draining stopped");
            break;
        }
        let entry = match entries.recv_timeout(POLL_INTERVAL) {
            Ok(entry) => entry,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };

        stats.update(&entry);

        let found = format!("Found: {}{}", root, entry.key);
        if ctx.quiet {
            info!("{}", found);
        } else {
            println!("{}", found);
        }

        if let Some(ref tx) = sink_tx {
            if tx.send(entry.key.clone()).is_err() {
                warn!("sink channel closed, emission stopped");
            }
        }
        if db_tx.send(entry).is_err() {
            error!("catalog writer gone, scan output is no longer persisted");
            break;
        }
    }

    // Closing the channels lets both consumers run down
    drop(db_tx);
    drop(sink_tx);

    let (catalog, saved, lost) = writer
        .join()
        .map_err(|_| crate::error::CatalogError::ChannelClosed)?;
    for worker in sink_workers {
        let _ = worker.join();
    }

    if cancel.is_cancelled() {
        return Err(crate::error::ScanError::Cancelled);
    }

    Ok((
        catalog,
        DispatchOutcome {
            saved,
            lost,
            sink_sent: sink_sent.load(Ordering::Relaxed),
            sink_failed: sink_failed.load(Ordering::Relaxed),
        },
    ))
}

/// Dedicated writer thread: accumulate one batch, save, repeat; the
/// residue is flushed at stream close. A failed batch is logged and
/// dropped - the writer keeps going.
fn spawn_catalog_writer(
    catalog: Box<dyn Catalog>,
    rx: Receiver<Entry>,
    batch_size: usize,
    cancel: crate::config::CancelToken,
) -> Result<JoinHandle<(Box<dyn Catalog>, u64, u64)>> {
    let handle = thread::Builder::new()
        .name("catalog-writer".into())
        .spawn(move || {
            let mut buffer: Vec<CatalogRow> = Vec::with_capacity(batch_size);
            let mut saved: u64 = 0;
            let mut lost: u64 = 0;

            let flush = |buffer: &mut Vec<CatalogRow>, saved: &mut u64, lost: &mut u64| {
                if buffer.is_empty() {
                    return;
                }
                match catalog.save_entries(buffer, "") {
                    Ok(()) => {
                        *saved += buffer.len() as u64;
                        debug!(count = buffer.len(), "saved batch");
                    }
                    Err(e) => {
                        *lost += buffer.len() as u64;
                        error!(count = buffer.len(), error = %e, "failed to save batch, dropped");
                    }
                }
                buffer.clear();
            };

            while let Ok(entry) = rx.recv() {
                buffer.push(CatalogRow::from(&entry));
                if buffer.len() >= batch_size {
                    flush(&mut buffer, &mut saved, &mut lost);
                }
            }

            // No partial batch is force-flushed after cancellation
            if cancel.is_cancelled() {
                if !buffer.is_empty() {
                    debug!(count = buffer.len(), "cancelled, partial batch discarded");
                }
            } else {
                flush(&mut buffer, &mut saved, &mut lost);
            }

            info!(saved, lost, "catalog writer finished");
            (catalog, saved, lost)
        })
        .map_err(|e| WorkerError::InitFailed {
            id: 0,
            reason: e.to_string(),
        })?;
    Ok(handle)
}

/// Bounded sink worker pool draining one shared channel
fn spawn_sink_pool(
    sink: Arc<dyn Sink>,
    rx: Receiver<String>,
    topic: String,
    concurrency: usize,
    sent: Arc<AtomicU64>,
    failed: Arc<AtomicU64>,
) -> Result<Vec<JoinHandle<()>>> {
    let mut workers = Vec::with_capacity(concurrency.max(1));
    for id in 0..concurrency.max(1) {
        let sink = Arc::clone(&sink);
        let rx = rx.clone();
        let topic = topic.clone();
        let sent = Arc::clone(&sent);
        let failed = Arc::clone(&failed);
        let handle = thread::Builder::new()
            .name(format!("sink-{}", id))
            .spawn(move || {
                while let Ok(key) = rx.recv() {
                    match sink.send(&topic, &key) {
                        Ok(()) => {
                            sent.fetch_add(1, Ordering::Relaxed);
                            debug!(topic = %topic, key = %key, "sent to sink");
                        }
                        Err(e) => {
                            failed.fetch_add(1, Ordering::Relaxed);
                            warn!(topic = %topic, key = %key, error = %e, "sink send failed");
                        }
                    }
                }
            })
            .map_err(|e| WorkerError::InitFailed {
                id,
                reason: e.to_string(),
            })?;
        workers.push(handle);
    }
    Ok(workers)
}
