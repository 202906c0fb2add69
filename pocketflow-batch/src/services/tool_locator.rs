//! P2Rank installation lookup
//!
//! The rescoring tool is located once per batch, before any worker starts.
//! Workers receive the resolved home and never search again.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable naming the P2Rank installation
pub const P2RANK_HOME_ENV: &str = "P2RANK_HOME";

/// Directory name of a local P2Rank unpack
pub const P2RANK_DIR_NAME: &str = "p2rank_2.5.1";

/// Launcher script inside a P2Rank home
pub const PRANK_SCRIPT: &str = "prank";

#[derive(Debug, Error)]
pub enum ToolError {
    /// No candidate location holds a `prank` launcher
    #[error("P2Rank not found (searched: {searched})")]
    NotFound { searched: String },
}

/// Resolved P2Rank installation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct P2RankHome {
    root: PathBuf,
}

impl P2RankHome {
    /// Accept `root` only when `<root>/prank` is a file
    pub fn validate(root: impl Into<PathBuf>) -> Option<Self> {
        let root = root.into();
        if root.join(PRANK_SCRIPT).is_file() {
            Some(Self { root })
        } else {
            None
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn prank_script(&self) -> PathBuf {
        self.root.join(PRANK_SCRIPT)
    }
}

/// Locates the P2Rank installation
///
/// Search order: explicit override → `P2RANK_HOME` → `./p2rank_2.5.1` →
/// `../p2rank_2.5.1`.
#[derive(Debug, Clone, Default)]
pub struct ToolLocator {
    base_dir: Option<PathBuf>,
}

impl ToolLocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Search relative to `base_dir` instead of the working directory
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: Some(base_dir.into()),
        }
    }

    /// Candidate homes in search order
    pub fn candidates(&self, override_home: Option<&Path>) -> Vec<PathBuf> {
        let mut candidates = Vec::new();
        if let Some(home) = override_home {
            candidates.push(home.to_path_buf());
        }
        if let Ok(env_home) = std::env::var(P2RANK_HOME_ENV) {
            if !env_home.trim().is_empty() {
                candidates.push(PathBuf::from(env_home));
            }
        }

        let base = self
            .base_dir
            .clone()
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."));
        candidates.push(base.join(P2RANK_DIR_NAME));
        if let Some(parent) = base.parent() {
            candidates.push(parent.join(P2RANK_DIR_NAME));
        }
        candidates
    }

    /// First valid home among [`Self::candidates`]
    pub fn resolve(&self, override_home: Option<&Path>) -> Result<P2RankHome, ToolError> {
        let candidates = self.candidates(override_home);
        for candidate in &candidates {
            if let Some(home) = P2RankHome::validate(candidate) {
                tracing::info!(home = %home.root().display(), "Resolved P2Rank installation");
                return Ok(home);
            }
            tracing::debug!(path = %candidate.display(), "No P2Rank launcher here");
        }

        let searched = candidates
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        Err(ToolError::NotFound { searched })
    }
}
