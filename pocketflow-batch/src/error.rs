//! Batch-level error taxonomy
//!
//! Only fatal conditions live here. Failures inside a single structure's
//! pipeline are recorded in that item's [`BatchItemResult`] and never
//! surface as a `BatchError`.
//!
//! [`BatchItemResult`]: crate::models::BatchItemResult

use crate::batch::report::ReportError;
use std::path::PathBuf;
use thiserror::Error;

/// Fatal batch errors, raised before any worker is scheduled
#[derive(Debug, Error)]
pub enum BatchError {
    /// Input root missing or not a directory
    #[error("Input not found: {0}")]
    InputNotFound(PathBuf),

    /// External rescoring tool missing or misconfigured
    #[error("Tool unavailable: {0}")]
    ToolUnavailable(String),

    /// Aggregate report could not be written
    #[error("Report error: {0}")]
    Report(#[from] ReportError),

    /// Configuration error from pocketflow-common
    #[error("Configuration error: {0}")]
    Config(#[from] pocketflow_common::Error),

    /// Output tree could not be prepared
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type BatchResult<T> = Result<T, BatchError>;
