//! Scan orchestration
//!
//! Wires the pipeline together for one job:
//!
//! ```text
//! Storage -> Walker -> (predicate) -> entry channel -> (stats tap)
//!                                        -> full:        Dispatcher -> Catalog + Sink
//!                                        -> incremental: DiffEngine -> new/changed
//! ```
//!
//! Compilation and open errors propagate out of [`start`]; errors inside
//! the pipeline are logged and absorbed by the stage that saw them.

mod diff;
mod dispatcher;
mod report;
mod stats;

pub use diff::{run_incremental_diff, DiffOutcome};
pub use dispatcher::{dispatch_full_scan, DispatchOutcome};
pub use stats::{dir_depth, Stats};

use crate::catalog::open_catalog;
use crate::config::JobContext;
use crate::error::Result;
use crate::sink::init_sink;
use crate::storage::{create_storage, Storage};
use crate::walker::{WalkOptions, Walker};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Run one scan invocation to completion
pub fn start(ctx: &JobContext) -> Result<()> {
    let started = Instant::now();

    report::print_banner(env!("CARGO_PKG_VERSION"));
    if ctx.csv {
        warn!("CSV report is not yet implemented");
    }
    if ctx.html {
        warn!("HTML report is not yet implemented");
    }

    let storage: Arc<dyn Storage> = Arc::from(create_storage(&ctx.uri)?);

    let catalog = open_catalog(&ctx.db_type, &ctx.catalog_path())?;

    let options = WalkOptions {
        concurrency: ctx.concurrency,
        depth: ctx.depth,
        match_filter: Arc::new(ctx.match_filter.clone()),
        exclude_filter: Arc::new(ctx.exclude_filter.clone()),
    };
    let (walker, entries) = Walker::start(Arc::clone(&storage), options, ctx.cancel.clone())?;

    let stats = Arc::new(Stats::new());

    let result = if ctx.incremental {
        info!(job = %ctx.job_id, "prior catalog found, running incremental scan");
        run_incremental_diff(entries, catalog, Arc::clone(&stats), ctx)
            .map(|(catalog, outcome)| (catalog, None, Some(outcome)))
    } else {
        info!(job = %ctx.job_id, "running full scan");
        let sink = init_sink(&ctx.sink);
        dispatch_full_scan(entries, catalog, sink, Arc::clone(&stats), ctx)
            .map(|(catalog, outcome)| {
                info!(
                    saved = outcome.saved,
                    lost = outcome.lost,
                    sink_sent = outcome.sink_sent,
                    sink_failed = outcome.sink_failed,
                    "full scan dispatch complete"
                );
                if outcome.lost > 0 {
                    warn!(lost = outcome.lost, "entries dropped on failed catalog batches");
                }
                (catalog, Some(outcome), None)
            })
    };

    walker.join();
    let (catalog, dispatch, diff) = result?;

    for row in diff.iter().flat_map(|d| d.new_files.iter()) {
        debug!(path = %row.path, "new file");
    }
    for row in diff.iter().flat_map(|d| d.changed_files.iter()) {
        debug!(path = %row.path, "changed file");
    }

    let ext_count = catalog.unique_ext_count().unwrap_or_else(|e| {
        warn!(error = %e, "failed to get file type count");
        0
    });

    report::print_summary(
        ctx,
        &stats,
        ext_count,
        started.elapsed(),
        dispatch.as_ref(),
        diff.as_ref(),
    );

    if let Err(e) = catalog.close() {
        warn!(error = %e, "error closing catalog");
    }
    if let Err(e) = storage.close() {
        warn!(error = %e, "error closing storage");
    }

    Ok(())
}
