//! Per-structure batch results
//!
//! One [`BatchItemResult`] is created per discovered structure file and is
//! never modified after the item's pipeline finishes.

use super::candidate::ScoredCandidate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Outcome of one batch item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Success,
    Failed,
    /// Not produced by normal operation; kept for filtered file types
    Skipped,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Success => "success",
            ItemStatus::Failed => "failed",
            ItemStatus::Skipped => "skipped",
        }
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the final top-K ranking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedCandidate {
    /// Final rank after rescoring (1-based)
    pub rank: usize,
    pub scored: ScoredCandidate,
    /// Rank by detection score among all rescored candidates (1-based)
    pub original_rank: usize,
    /// `original_rank - rank`; positive means rescoring moved it up
    pub rank_change: i64,
    /// Whether the candidate sits above the cliff
    pub is_high_confidence: bool,
}

impl RankedCandidate {
    /// Report name, e.g. `pocket.1`
    pub fn pocket_name(&self) -> String {
        format!("pocket.{}", self.rank)
    }

    /// Rank change with explicit sign (`+2`, `-1`, `0`)
    pub fn rank_change_display(&self) -> String {
        if self.rank_change == 0 {
            "0".to_string()
        } else {
            format!("{:+}", self.rank_change)
        }
    }
}

/// Confidence stratification fields attached to a batch item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CliffSummary {
    pub high_confidence_count: usize,
    pub is_top1_dominant: bool,
    pub max_delta: f64,
    pub cliff_index: usize,
    pub top1_score: f64,
    /// Display identifiers of the high-confidence candidates
    pub high_confidence_ids: Vec<String>,
}

/// Result of processing one structure file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchItemResult {
    /// Structure name (file stem)
    pub name: String,
    /// Source file path
    pub path: PathBuf,
    pub status: ItemStatus,
    /// Error text for failed items
    pub error: Option<String>,
    /// Candidates returned by detection
    pub detected_count: usize,
    /// Candidates left after overlap clustering
    pub filtered_count: usize,
    pub top_k: Vec<RankedCandidate>,
    pub processing_time: Duration,
    pub cliff_summary: Option<CliffSummary>,
}

impl BatchItemResult {
    /// Failed result carrying the error text and elapsed time
    pub fn failed(
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        error: impl Into<String>,
        processing_time: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            status: ItemStatus::Failed,
            error: Some(error.into()),
            detected_count: 0,
            filtered_count: 0,
            top_k: Vec::new(),
            processing_time,
            cliff_summary: None,
        }
    }

    /// Skipped result (no processing attempted)
    pub fn skipped(name: impl Into<String>, path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self {
            status: ItemStatus::Skipped,
            ..Self::failed(name, path, reason, Duration::ZERO)
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ItemStatus::Success
    }

    pub fn is_failed(&self) -> bool {
        self.status == ItemStatus::Failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Candidate;

    #[test]
    fn test_status_strings() {
        assert_eq!(ItemStatus::Success.to_string(), "success");
        assert_eq!(ItemStatus::Failed.to_string(), "failed");
        assert_eq!(ItemStatus::Skipped.to_string(), "skipped");
        assert_eq!(serde_json::to_string(&ItemStatus::Failed).unwrap(), "\"failed\"");
    }

    #[test]
    fn test_rank_change_display() {
        let mut ranked = RankedCandidate {
            rank: 1,
            scored: Candidate::new((0.0, 0.0, 0.0), 1.0).scored(2.0),
            original_rank: 3,
            rank_change: 2,
            is_high_confidence: true,
        };
        assert_eq!(ranked.rank_change_display(), "+2");
        ranked.rank_change = -1;
        assert_eq!(ranked.rank_change_display(), "-1");
        ranked.rank_change = 0;
        assert_eq!(ranked.rank_change_display(), "0");
        assert_eq!(ranked.pocket_name(), "pocket.1");
    }

    #[test]
    fn test_failed_and_skipped_constructors() {
        let failed = BatchItemResult::failed("1abc", "/in/1abc.pdb", "boom", Duration::from_secs(2));
        assert!(failed.is_failed());
        assert_eq!(failed.error.as_deref(), Some("boom"));
        assert!(failed.top_k.is_empty());

        let skipped = BatchItemResult::skipped("x", "/in/x.txt", "unsupported");
        assert_eq!(skipped.status, ItemStatus::Skipped);
        assert_eq!(skipped.processing_time, Duration::ZERO);
    }
}
