//! Incremental diff engine
//!
//! Classifies the walker stream against a prior full scan in two stages:
//!
//! 1. A bloom filter warmed with every known path splits the stream into
//!    *definitely-new* entries (a bloom miss cannot be a false negative)
//!    and *candidates*.
//! 2. Candidates are batched into a uniquely named temp table, then two
//!    joins against `file_entries` recover the exact answer: a left
//!    anti-join yields the new files the bloom falsely recognized, an
//!    inner join on differing ctime/mtime yields the changed files.
//!
//! Unchanged files are not reported and deletion detection is out of
//! scope. The temp table is dropped before the engine returns.

use super::stats::Stats;
use crate::catalog::{Catalog, CatalogRow};
use crate::config::JobContext;
use crate::error::{Result, ScanError};
use crate::storage::Entry;
use bloomfilter::Bloom;
use crossbeam_channel::{Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Bloom capacity: one hundred million paths
const BLOOM_ITEMS: usize = 100_000_000;

/// False-positive rate; at the capacity above this costs about 143 MiB
const BLOOM_FP_RATE: f64 = 0.001;

/// Poll interval for cancellation-aware receives
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Classification result of one incremental scan
#[derive(Debug, Default)]
pub struct DiffOutcome {
    /// Files absent from the prior scan (bloom-definite plus exact-new)
    pub new_files: Vec<CatalogRow>,
    /// Files whose ctime or mtime changed since the prior scan
    pub changed_files: Vec<CatalogRow>,
    /// Candidates routed through the temp table (bounds bloom waste)
    pub candidates: u64,
}

/// Run the two-stage classification to completion and hand the catalog
/// back for the summary queries.
pub fn run_incremental_diff(
    entries: Receiver<Entry>,
    catalog: Box<dyn Catalog>,
    stats: Arc<Stats>,
    ctx: &JobContext,
) -> Result<(Box<dyn Catalog>, DiffOutcome)> {
    let cancel = ctx.cancel.clone();

    // Stage 1 prefilter, warmed from the canonical table. Built here,
    // then used only on this thread.
    let mut bloom: Bloom<str> = Bloom::new_for_fp_rate(BLOOM_ITEMS, BLOOM_FP_RATE);
    let mut known: u64 = 0;
    catalog.for_each_path(&mut |path| {
        bloom.set(path);
        known += 1;
    })?;
    info!(known, "bloom prefilter warmed");

    let temp_table = temp_table_name();
    catalog.create_table(&temp_table)?;

    let mut definitely_new: Vec<CatalogRow> = Vec::new();
    let mut buffer: Vec<CatalogRow> = Vec::with_capacity(ctx.batch_size);
    let mut candidates: u64 = 0;

    let flush = |catalog: &dyn Catalog, buffer: &mut Vec<CatalogRow>| {
        if buffer.is_empty() {
            return;
        }
        if let Err(e) = catalog.save_entries(buffer, &temp_table) {
            warn!(count = buffer.len(), error = %e, "failed to save candidate batch, dropped");
        }
        buffer.clear();
    };

    loop {
        if cancel.is_cancelled() {
            // Disposable state only; partial batches are not flushed
            let _ = catalog.drop_table(&temp_table);
            return Err(ScanError::Cancelled);
        }
        let entry = match entries.recv_timeout(POLL_INTERVAL) {
            Ok(entry) => entry,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };

        stats.update(&entry);

        if bloom.check(&entry.key) {
            candidates += 1;
            buffer.push(CatalogRow::from(&entry));
            if buffer.len() >= ctx.batch_size {
                flush(catalog.as_ref(), &mut buffer);
            }
        } else {
            debug!(path = %entry.key, "bloom miss, definitely new");
            definitely_new.push(CatalogRow::from(&entry));
        }
    }
    flush(catalog.as_ref(), &mut buffer);

    // Stage 2: exact classification through the temp table
    let exact_new = catalog.query_exact_new_files(&temp_table)?;
    let changed_files = catalog.query_changed_files(&temp_table)?;

    if let Err(e) = catalog.drop_table(&temp_table) {
        warn!(table = %temp_table, error = %e, "failed to drop temp table");
    }

    info!(
        definitely_new = definitely_new.len(),
        exact_new = exact_new.len(),
        changed = changed_files.len(),
        candidates,
        "incremental classification complete"
    );

    let mut new_files = definitely_new;
    new_files.extend(exact_new);

    Ok((
        catalog,
        DiffOutcome {
            new_files,
            changed_files,
            candidates,
        },
    ))
}

/// SQL-safe unique temp table name
fn temp_table_name() -> String {
    format!(
        "temp_files_{}",
        Uuid::new_v4().to_string().replace('-', "_")
    )
}
