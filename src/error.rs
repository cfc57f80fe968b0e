//! Error types for the reconciliation pipeline.
//!
//! Only failures that abort a run live here. Per-file parse problems and
//! lookup misses are carried as data (`IngestWarning`, `ExclusionEntry`).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// A required column is missing from an input table
    #[error("Schema error: {0}")]
    Schema(String),

    /// A single file or row could not be parsed; callers skip it
    #[error("Parse error: {0}")]
    Parse(String),

    /// Nothing survived ingestion or filtering
    #[error("No records left: {0}")]
    EmptyResult(String),

    /// The archive container itself could not be opened
    #[error("Archive error: {0}")]
    Archive(String),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
