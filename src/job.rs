//! Job directory bookkeeping
//!
//! Every invocation runs under `<exe-dir>/jobs/<jobId>/`, which holds the
//! catalog (`index.db`) and the job log (`terrasync.log`). A job directory
//! that already exists means a prior scan ran under the same id, which
//! switches the run to incremental mode.

use crate::error::{ConfigError, Result};
use chrono::Local;
use std::fs;
use std::path::{Path, PathBuf};

/// Autogenerated id shape: `Job_YYYY-MM-DD_HH.MM.SS.ffffff_scan`
pub fn generate_job_id(explicit: Option<&str>) -> String {
    match explicit {
        Some(id) => format!("Job_{}_scan", id),
        None => format!("Job_{}_scan", Local::now().format("%Y-%m-%d_%H.%M.%S.%6f")),
    }
}

/// Resolve the job directory under `base/jobs/<job_id>` and report
/// whether this run is incremental. The directory is created for a first
/// run and left untouched when it already exists.
pub fn prepare_job_dir(base: &Path, job_id: &str) -> Result<(PathBuf, bool)> {
    let job_dir = base.join("jobs").join(job_id);

    if job_dir.is_dir() {
        return Ok((job_dir, true));
    }

    fs::create_dir_all(&job_dir).map_err(|e| ConfigError::InvalidJobDir {
        path: job_dir.clone(),
        reason: e.to_string(),
    })?;
    Ok((job_dir, false))
}
