//! Configuration types for terrasync
//!
//! This module defines:
//! - CLI argument parsing using clap derive macros
//! - The validated per-invocation [`JobContext`]
//! - The cooperative [`CancelToken`] observed by every pipeline stage
//!
//! Runtime knobs that the CLI does not expose as scan flags (sink broker,
//! batch size, catalog backend) read their defaults from environment
//! variables, so a deployment can pin them without wrapper scripts.

use crate::error::ConfigError;
use crate::filter::ConditionFilter;
use crate::sink::SinkConfig;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Batch size limits
const MIN_BATCH_SIZE: usize = 1;
const MAX_BATCH_SIZE: usize = 100_000;

/// Worker count used when the flag is zero or unset
pub const DEFAULT_CONCURRENCY: usize = 5;

/// Storage tree scanner with relational catalog output
#[derive(Parser, Debug, Clone)]
#[command(
    name = "terrasync",
    version,
    about = "Scan storage systems and build a relational catalog of every entry",
    long_about = "Read all the files in a file tree and create a report based on the options.\n\n\
                  The first scan of a job is a full scan that populates the catalog; running\n\
                  the same job id again performs an incremental scan that classifies entries\n\
                  as new or changed against the prior catalog.",
    after_help = "EXAMPLES:\n    \
        terrasync scan /mnt/data\n    \
        terrasync scan -d 4 /mnt/data\n    \
        terrasync scan -m \"size > 100M and type == 'file'\" /mnt/data\n    \
        terrasync scan -e \"modified < 0.5\" /mnt/data\n    \
        terrasync scan --id nightly /mnt/data   # second run is incremental\n    \
        terrasync -l debug scan -q /mnt/data"
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Command,

    /// Log level for the job log file
    #[arg(
        short = 'l',
        long,
        global = true,
        default_value = "info",
        value_parser = ["debug", "info"]
    )]
    pub loglevel: String,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Scan a storage system and catalog its entries
    Scan {
        /// Storage URI: a local path, host:/export, or s3://bucket
        #[arg(value_name = "URI")]
        uri: String,

        /// Job id; reusing an id switches to incremental mode
        #[arg(long, value_name = "ID")]
        id: Option<String>,

        /// Maximum scan depth (0 = unlimited)
        #[arg(short = 'd', long, default_value_t = 0, value_name = "NUM")]
        depth: usize,

        /// Emit only entries matching the expression
        #[arg(short = 'm', long = "match", value_name = "EXPR")]
        match_expr: Option<String>,

        /// Suppress entries matching the expression
        #[arg(short = 'e', long = "exclude", value_name = "EXPR")]
        exclude_expr: Option<String>,

        /// Create CSV report
        #[arg(long)]
        csv: bool,

        /// Create HTML report
        #[arg(long)]
        html: bool,

        /// No output in the console, but in the log
        #[arg(short = 'q', long)]
        quiet: bool,

        /// Number of walker threads
        #[arg(
            long,
            env = "TERRASYNC_CONCURRENCY",
            default_value_t = DEFAULT_CONCURRENCY,
            value_name = "NUM"
        )]
        concurrency: usize,

        /// Catalog batch insert size
        #[arg(
            long,
            env = "TERRASYNC_BATCH_SIZE",
            default_value_t = 1000,
            value_name = "NUM"
        )]
        batch_size: usize,

        /// Catalog backend
        #[arg(
            long,
            env = "TERRASYNC_DB_TYPE",
            default_value = "sqlite",
            value_name = "TYPE"
        )]
        db_type: String,

        /// Scan deadline in seconds (0 = none)
        #[arg(
            long,
            env = "TERRASYNC_TIMEOUT",
            default_value_t = 0,
            value_name = "SECS"
        )]
        timeout: u64,

        /// Emit every entry key to the message sink
        #[arg(long)]
        sink: bool,

        /// Sink broker url
        #[arg(
            long,
            env = "TERRASYNC_SINK_URL",
            default_value = "redis://127.0.0.1:6379",
            value_name = "URL"
        )]
        sink_url: String,

        /// Sink topic (stream name); empty disables emission
        #[arg(long, env = "TERRASYNC_SINK_TOPIC", default_value = "", value_name = "TOPIC")]
        sink_topic: String,

        /// Concurrent sink send workers
        #[arg(
            long,
            env = "TERRASYNC_SINK_CONCURRENCY",
            default_value_t = 5,
            value_name = "NUM"
        )]
        sink_concurrency: usize,
    },
}

/// Cooperative cancellation: a shared flag plus an optional deadline.
/// Every pipeline stage polls this at its channel operations.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancelToken {
    pub fn new(deadline: Option<Instant>) -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            deadline,
        }
    }

    /// Deadline `timeout` from now; zero means no deadline
    pub fn with_timeout(timeout: Duration) -> Self {
        let deadline = (!timeout.is_zero()).then(|| Instant::now() + timeout);
        Self::new(deadline)
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
            || self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}

/// Everything one scan invocation needs, validated and compiled
#[derive(Debug, Clone)]
pub struct JobContext {
    pub job_id: String,
    pub job_dir: PathBuf,
    pub incremental: bool,
    pub uri: String,
    pub concurrency: usize,
    pub depth: usize,
    pub batch_size: usize,
    pub db_type: String,
    pub match_filter: ConditionFilter,
    pub exclude_filter: ConditionFilter,
    pub sink: SinkConfig,
    pub quiet: bool,
    pub csv: bool,
    pub html: bool,
    pub cmdline: String,
    pub cancel: CancelToken,
}

impl JobContext {
    /// Validate the numeric knobs; zero concurrency falls back to the
    /// default rather than erroring, matching the CLI contract.
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        if self.concurrency == 0 {
            self.concurrency = DEFAULT_CONCURRENCY;
        }
        if self.batch_size < MIN_BATCH_SIZE || self.batch_size > MAX_BATCH_SIZE {
            return Err(ConfigError::InvalidBatchSize {
                size: self.batch_size,
                min: MIN_BATCH_SIZE,
                max: MAX_BATCH_SIZE,
            });
        }
        if self.sink.concurrency == 0 {
            self.sink.concurrency = DEFAULT_CONCURRENCY;
        }
        Ok(())
    }

    /// Path of the catalog database inside the job directory
    pub fn catalog_path(&self) -> PathBuf {
        self.job_dir.join("index.db")
    }

    /// Path of the job log file
    pub fn log_path(&self) -> PathBuf {
        self.job_dir.join("terrasync.log")
    }
}
