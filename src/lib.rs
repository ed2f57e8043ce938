//! terrasync - Storage Tree Scanner
//!
//! Walks a tree-structured storage system (local filesystem today; NFS
//! and S3 pluggable) and produces a relational catalog of every file and
//! directory together with an aggregate report. The first scan of a job
//! is a full scan; re-running the same job id performs an incremental
//! scan that classifies entries as new or changed against the prior
//! catalog, using a bloom prefilter and an exact temp-table join.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      Storage backend                            │
//! │                 (local FS / NFS / S3 stub)                      │
//! └─────────────────────────────┬───────────────────────────────────┘
//!                               │ list()
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      Walker Threads                             │
//! │  ┌─────────┐  ┌─────────┐  ┌─────────┐         ┌─────────┐     │
//! │  │Worker 1 │  │Worker 2 │  │Worker 3 │  ...    │Worker N │     │
//! │  │ filter  │  │ filter  │  │ filter  │         │ filter  │     │
//! │  └────┬────┘  └────┬────┘  └────┬────┘         └────┬────┘     │
//! │       └────────────┴─────┬──────┴────────────────────┘          │
//! │                          ▼                                      │
//! │            ┌──────────────────────────┐                         │
//! │            │      Entry Channel       │                         │
//! │            │   (crossbeam bounded)    │                         │
//! │            └────────────┬─────────────┘                         │
//! │                   stats │ tap                                   │
//! │          ┌──────────────┴──────────────┐                        │
//! │          ▼                             ▼                        │
//! │  ┌───────────────┐            ┌─────────────────┐               │
//! │  │  Full scan:   │            │  Incremental:   │               │
//! │  │ batched writer│            │ bloom prefilter │               │
//! │  │  + sink pool  │            │ + temp-table    │               │
//! │  └───────┬───────┘            │   anti/semi-join│               │
//! └──────────┼────────────────────┴────────┬────────┴───────────────┘
//!            ▼                             ▼
//!   ┌──────────────────┐          ┌──────────────────┐
//!   │ Catalog (SQLite) │          │  new / changed   │
//!   │  + message sink  │          │     entries      │
//!   └──────────────────┘          └──────────────────┘
//! ```
//!
//! # Example
//!
//! ```bash
//! # Full scan into a fresh job
//! terrasync scan --id nightly /mnt/data
//!
//! # Same id again: incremental, reports new and changed files
//! terrasync scan --id nightly /mnt/data
//!
//! # Filtered scan
//! terrasync scan -m "size > 100M and type == 'file'" /mnt/data
//! ```

pub mod catalog;
pub mod config;
pub mod error;
pub mod filter;
pub mod job;
pub mod scan;
pub mod sink;
pub mod storage;
pub mod walker;

pub use config::{CancelToken, CliArgs, Command, JobContext};
pub use error::{Result, ScanError};
pub use filter::ConditionFilter;
pub use storage::{create_storage, Entry, Storage};
