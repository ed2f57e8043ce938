//! Console report
//!
//! The banner and summary print to stdout and are mirrored into the log,
//! so a quiet run still leaves a complete record in the job directory.

use super::diff::DiffOutcome;
use super::dispatcher::DispatchOutcome;
use super::stats::Stats;
use crate::config::JobContext;
use humansize::{format_size, BINARY};
use std::time::Duration;
use tracing::info;

/// Print to the console and mirror into the log file
macro_rules! report_line {
    ($($arg:tt)*) => {{
        println!($($arg)*);
        info!($($arg)*);
    }};
}

pub fn print_banner(version: &str) {
    let banner = format!("terrasync {}; (c) 2025 LenovoNetapp, Inc.", version);
    println!("{}\n", banner);
    info!("{}", banner);
}

/// End-of-scan summary: invocation metadata, aggregate statistics, and in
/// incremental mode the classification counts.
pub fn print_summary(
    ctx: &JobContext,
    stats: &Stats,
    ext_count: i64,
    elapsed: Duration,
    dispatch: Option<&DispatchOutcome>,
    diff: Option<&DiffOutcome>,
) {
    let total_secs = Duration::from_secs(elapsed.as_secs());

    println!();
    report_line!("==================================================================");
    report_line!("                          Scan Statistics                         ");
    report_line!("==================================================================");
    println!();

    report_line!("  Command    :    {}", ctx.cmdline);
    report_line!("  Total time :    {:?}", total_secs);
    report_line!("  Job ID     :    {}", ctx.job_id);
    report_line!("  Log Path   :    {}", ctx.log_path().display());
    println!();

    report_line!(
        "  Scan completed. Files: {}, Directories: {}, Total size: {} ({} bytes)",
        stats.file_count(),
        stats.dir_count(),
        format_size(stats.total_size().max(0) as u64, BINARY),
        stats.total_size()
    );
    report_line!(
        "  Symlinks: {}, Regular files: {}",
        stats.symlink_count(),
        stats.regular_count()
    );
    report_line!(
        "  File name statistics: Average length: {}, Max length: {}",
        stats.avg_name_len(),
        stats.max_name_len()
    );
    report_line!(
        "  Directory depth statistics: Average depth: {}, Max depth: {}",
        stats.avg_dir_depth(),
        stats.max_dir_depth()
    );
    report_line!("  File type:        {:>30}", ext_count);

    if let Some(dispatch) = dispatch {
        report_line!("  Catalog: {} entries saved", dispatch.saved);
        if dispatch.lost > 0 {
            report_line!("  Catalog: {} entries dropped on failed batches", dispatch.lost);
        }
        if dispatch.sink_sent > 0 || dispatch.sink_failed > 0 {
            report_line!(
                "  Sink: {} messages sent, {} failed",
                dispatch.sink_sent,
                dispatch.sink_failed
            );
        }
    }

    if let Some(diff) = diff {
        report_line!(
            "  Incremental: {} new, {} changed ({} candidates verified)",
            diff.new_files.len(),
            diff.changed_files.len(),
            diff.candidates
        );
    }

    println!();
    report_line!("=================================================================");
}
