use std::path::PathBuf;
use thiserror::Error;

use crate::db::DatabaseError;

#[derive(Error, Debug)]
pub enum AggregatorError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid scrape request: {0}")]
    Validation(#[from] ValidationError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Operation error: {0}")]
    Operation(#[from] OperationError),

    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Failed to initialize logging: {0}")]
    Logging(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Invalid platform '{name}': {reason}")]
    InvalidPlatform { name: String, reason: String },

    #[error("Invalid provider '{name}': {reason}")]
    InvalidProvider { name: String, reason: String },
}

/// Rejected scrape parameters. Raised before any side effect.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Unsupported platform: {0}")]
    UnknownPlatform(String),

    #[error("Limit must be between {min} and {max}, got {value}")]
    LimitOutOfRange { value: u32, min: u32, max: u32 },

    #[error("{field} must not be empty")]
    EmptyField { field: &'static str },

    #[error("{field} must be at most {max} characters")]
    FieldTooLong { field: &'static str, max: usize },

    #[error("Too many scrapes in progress (max {max})")]
    TooManyOperations { max: u64 },
}

/// Failure while saving a single candidate.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error("Synthetic posting '{title}' cannot be persisted")]
    SyntheticCandidate { title: String },

    #[error("Invalid candidate: {0}")]
    InvalidCandidate(String),
}

/// Fatal failure of one orchestration run.
#[derive(Error, Debug)]
pub enum OperationError {
    #[error("Scrape cancelled")]
    Cancelled,

    #[error("No provider chain configured for platform '{0}'")]
    MissingChain(String),

    #[error("Failed to prepare platform '{platform}': {source}")]
    Prepare {
        platform: String,
        #[source]
        source: StoreError,
    },

    #[error("Scrape task failed: {0}")]
    TaskFailed(String),
}

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Failed to load jobs for export: {0}")]
    Store(#[from] StoreError),

    #[error("Failed to write CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("Failed to finalize CSV output: {0}")]
    Finalize(String),
}

pub type Result<T> = std::result::Result<T, AggregatorError>;
