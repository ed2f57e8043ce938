//! Error types for terrasync
//!
//! This module defines the error hierarchy for the scan pipeline:
//! - Configuration and CLI errors (fatal, reported to the user)
//! - Storage errors (a directory listing failure skips that directory)
//! - Catalog errors (a failed batch is dropped, the writer continues)
//! - Sink errors (init failure downgrades to no-sink)
//! - Filter compilation errors
//!
//! Design philosophy:
//! - Use thiserror for structured error types in library code
//! - Errors should be actionable - include context about what to do
//! - In-pipeline errors are logged and swallowed; only compilation and
//!   open errors propagate out of the scan entry point

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for the terrasync application
#[derive(Error, Debug)]
pub enum ScanError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Filter expression compilation errors
    #[error("Filter error: {0}")]
    Filter(#[from] FilterError),

    /// Storage backend errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Catalog database errors
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// Message sink errors
    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),

    /// Worker/concurrency errors
    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    /// I/O errors (job directory setup, log file, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Scan cancelled by signal or deadline
    #[error("Scan cancelled")]
    Cancelled,
}

/// Configuration and CLI errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Storage URI did not match any known backend
    #[error("Unsupported storage type for uri: {uri}")]
    UnsupportedUri { uri: String },

    /// Local scan path does not exist or is not a directory
    #[error("Invalid scan path '{path}': {reason}")]
    InvalidScanPath { path: String, reason: String },

    /// Invalid batch size
    #[error("Invalid batch size {size}: must be between {min} and {max}")]
    InvalidBatchSize { size: usize, min: usize, max: usize },

    /// Unknown catalog backend name
    #[error("Unsupported database type: {db_type}")]
    UnsupportedDbType { db_type: String },

    /// Job directory could not be prepared
    #[error("Invalid job directory '{path}': {reason}")]
    InvalidJobDir { path: PathBuf, reason: String },
}

/// Filter expression compilation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    /// No valid operator found, or the operator is not admissible for
    /// the property's value type
    #[error("Invalid operator in condition: {clause}")]
    InvalidOperator { clause: String },

    /// Property is not one of name, path, type, size, modified
    #[error("Unsupported property: {property}")]
    InvalidProperty { property: String },

    /// Size value did not parse as `N[.N][kKmMgGtT]?`
    #[error("Invalid size format: {value}")]
    InvalidSizeFormat { value: String },

    /// Modified value did not parse as a float hour count
    #[error("Invalid duration: {value}")]
    InvalidDuration { value: String },

    /// Clause is missing a property or a value
    #[error("Malformed condition: {clause}")]
    MalformedClause { clause: String },
}

/// Storage backend errors
#[derive(Error, Debug)]
pub enum StorageError {
    /// Directory listing failed
    #[error("Failed to list directory '{path}': {reason}")]
    ListFailed { path: String, reason: String },

    /// Stat operation failed
    #[error("Failed to stat '{path}': {reason}")]
    StatFailed { path: String, reason: String },

    /// Write operation failed
    #[error("Failed to write '{path}': {reason}")]
    WriteFailed { path: String, reason: String },

    /// Delete operation failed
    #[error("Failed to delete '{path}': {reason}")]
    DeleteFailed { path: String, reason: String },

    /// Operation not implemented by this backend
    #[error("{backend} storage does not support {op}")]
    Unsupported {
        backend: &'static str,
        op: &'static str,
    },
}

/// Catalog database errors
#[derive(Error, Debug)]
pub enum CatalogError {
    /// SQLite error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Failed to open the catalog database
    #[error("Failed to open catalog at '{path}': {reason}")]
    OpenFailed { path: PathBuf, reason: String },

    /// Table name contains characters that are not SQL-identifier safe
    #[error("Invalid table name: {name}")]
    InvalidTableName { name: String },

    /// Writer channel closed unexpectedly
    #[error("Catalog writer channel closed unexpectedly")]
    ChannelClosed,
}

/// Message sink errors
#[derive(Error, Debug)]
pub enum SinkError {
    /// Redis protocol or connection error
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Failed to connect to the sink broker
    #[error("Failed to connect to sink at '{url}': {reason}")]
    ConnectFailed { url: String, reason: String },

    /// A message could not be delivered after retries
    #[error("Failed to send to topic '{topic}' after {attempts} attempts: {reason}")]
    SendFailed {
        topic: String,
        attempts: u32,
        reason: String,
    },

    /// Sink configuration is incomplete (missing url or topic)
    #[error("Invalid sink configuration: {reason}")]
    InvalidConfig { reason: String },
}

/// Worker thread errors
#[derive(Error, Debug)]
pub enum WorkerError {
    /// Worker panicked
    #[error("Worker {id} panicked")]
    Panicked { id: usize },

    /// Worker initialization failed
    #[error("Failed to initialize worker {id}: {reason}")]
    InitFailed { id: usize, reason: String },
}

/// Result type alias for ScanError
pub type Result<T> = std::result::Result<T, ScanError>;

/// Result type alias for StorageError
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Result type alias for CatalogError
pub type CatalogResult<T> = std::result::Result<T, CatalogError>;

/// Result type alias for SinkError
pub type SinkResult<T> = std::result::Result<T, SinkError>;

/// Result type alias for FilterError
pub type FilterResult<T> = std::result::Result<T, FilterError>;
