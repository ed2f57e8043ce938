//! terrasync - Storage Tree Scanner
//!
//! Entry point for the CLI application.

use anyhow::{Context, Result};
use clap::Parser;
use std::fs::File;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use terrasync::config::{CancelToken, CliArgs, Command, JobContext};
use terrasync::filter::ConditionFilter;
use terrasync::sink::SinkConfig;
use terrasync::{job, scan};
use tracing::error;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let args = CliArgs::parse();
    let cmdline = std::env::args().collect::<Vec<_>>().join(" ");

    match args.command.clone() {
        Command::Scan {
            uri,
            id,
            depth,
            match_expr,
            exclude_expr,
            csv,
            html,
            quiet,
            concurrency,
            batch_size,
            db_type,
            timeout,
            sink,
            sink_url,
            sink_topic,
            sink_concurrency,
        } => {
            let job_id = job::generate_job_id(id.as_deref());
            let (job_dir, incremental) = job::prepare_job_dir(&exe_dir()?, &job_id)?;

            setup_logging(&job_dir.join("terrasync.log"), &args.loglevel)?;

            let match_filter = ConditionFilter::compile(match_expr.as_deref().unwrap_or(""))
                .context("failed to compile match expression")?;
            let exclude_filter =
                ConditionFilter::compile(exclude_expr.as_deref().unwrap_or(""))
                    .context("failed to compile exclude expression")?;

            let mut ctx = JobContext {
                job_id,
                job_dir,
                incremental,
                uri,
                concurrency,
                depth,
                batch_size,
                db_type,
                match_filter,
                exclude_filter,
                sink: SinkConfig {
                    enabled: sink,
                    url: sink_url,
                    topic: sink_topic,
                    concurrency: sink_concurrency,
                },
                quiet,
                csv,
                html,
                cmdline,
                cancel: CancelToken::with_timeout(Duration::from_secs(timeout)),
            };
            ctx.validate().context("invalid configuration")?;

            install_signal_handler(&ctx.cancel)?;

            scan::start(&ctx).context("failed to scan")?;
        }
    }

    Ok(())
}

/// Directory of the running executable; the jobs tree lives beside it
fn exe_dir() -> Result<PathBuf> {
    let exe = std::env::current_exe().context("failed to get executable path")?;
    Ok(exe
        .parent()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(".")))
}

/// Log to the job log file; the console stays reserved for scan output
fn setup_logging(log_path: &std::path::Path, loglevel: &str) -> Result<()> {
    let filter = match loglevel {
        "debug" => EnvFilter::new("terrasync=debug"),
        _ => EnvFilter::new("terrasync=info"),
    };

    let log_file = File::options()
        .create(true)
        .append(true)
        .open(log_path)
        .with_context(|| format!("failed to open log file {}", log_path.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Arc::new(log_file))
        .with_ansi(false)
        .with_target(false)
        .init();

    Ok(())
}

/// First Ctrl+C requests a graceful stop; the second exits immediately
fn install_signal_handler(cancel: &CancelToken) -> Result<()> {
    let cancel = cancel.clone();
    let mut interrupted = false;
    ctrlc::set_handler(move || {
        if !interrupted {
            interrupted = true;
            eprintln!("\nInterrupt received, shutting down gracefully...");
            eprintln!("Press Ctrl+C again to force exit immediately.");
            cancel.cancel();
        } else {
            eprintln!("\nForced exit!");
            std::process::exit(130);
        }
    })
    .context("failed to set signal handler")?;
    Ok(())
}
