//! Collaborator traits for the external detection and rescoring tools
//!
//! The pipeline only sees these traits. Subprocess-backed implementations
//! live in [`crate::services`]; tests substitute in-process fakes.

use crate::models::{Candidate, ScoredCandidate};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Detection collaborator errors
#[derive(Debug, Error)]
pub enum DetectionError {
    /// Tool could not be started
    #[error("Failed to launch {tool}: {message}")]
    Launch { tool: String, message: String },

    /// Tool exited with a non-zero status
    #[error("{tool} exited with status {code:?}: {stderr}")]
    ToolFailed {
        tool: String,
        code: Option<i32>,
        stderr: String,
    },

    /// Expected output artifact was not produced
    #[error("Missing output: {0}")]
    MissingOutput(PathBuf),

    /// Output artifact exists but could not be parsed
    #[error("Parse error in {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Detection failed: {0}")]
    Failed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Rescoring collaborator errors
#[derive(Debug, Error)]
pub enum RescoringError {
    /// Tool home missing or not runnable
    #[error("Rescoring tool not installed or misconfigured: {0}")]
    NotInstalled(String),

    #[error("Failed to launch {tool}: {message}")]
    Launch { tool: String, message: String },

    #[error("{tool} exited with status {code:?}: {stderr}")]
    ToolFailed {
        tool: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("Missing output: {0}")]
    MissingOutput(PathBuf),

    #[error("Parse error in {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Rescoring failed: {0}")]
    Failed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Proposes candidate sites for one structure
#[async_trait]
pub trait Detector: Send + Sync {
    /// Tool name used in logs
    fn name(&self) -> &'static str;

    /// Run detection for `structure`, writing intermediate files under `workdir`
    async fn detect(
        &self,
        structure: &Path,
        workdir: &Path,
    ) -> Result<Vec<Candidate>, DetectionError>;
}

/// Assigns an independent score to deduplicated candidates
#[async_trait]
pub trait Rescorer: Send + Sync {
    fn name(&self) -> &'static str;

    /// Rescore `candidates` for `structure`, writing under `workdir`
    async fn rescore(
        &self,
        candidates: &[Candidate],
        structure: &Path,
        workdir: &Path,
    ) -> Result<Vec<ScoredCandidate>, RescoringError>;
}
