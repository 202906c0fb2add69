//! Per-structure pipeline
//!
//! detect → overlap clustering → rescore → rank → cliff analysis.
//!
//! # Error Handling
//! [`StructurePipeline::run`] returns a [`PipelineError`] for any stage
//! failure. [`StructurePipeline::process`] never fails: errors become a
//! failed [`BatchItemResult`] so one structure cannot take down a batch.

use crate::models::{BatchItemResult, ItemStatus, RankedCandidate, ScoredCandidate};
use crate::services::cliff_analyzer::{analyze_cliff, CliffAnalysis, CliffError};
use crate::services::OverlapClusterer;
use crate::types::{DetectionError, Detector, Rescorer, RescoringError};
use pocketflow_common::config::BatchSection;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Pipeline errors, one per failing stage
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Detection failed: {0}")]
    Detection(#[from] DetectionError),

    #[error("Rescoring failed: {0}")]
    Rescoring(#[from] RescoringError),

    /// A stage exceeded the configured per-stage timeout
    #[error("{stage} timed out after {limit:?}")]
    Timeout { stage: &'static str, limit: Duration },

    #[error("Cliff analysis failed: {0}")]
    Cliff(#[from] CliffError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Per-structure settings
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    /// Rescored candidates kept in the result
    pub top_k: usize,
    pub enable_confidence_stratification: bool,
    /// Applied separately to detection and rescoring
    pub item_timeout: Option<Duration>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            top_k: 5,
            enable_confidence_stratification: true,
            item_timeout: None,
        }
    }
}

impl PipelineSettings {
    pub fn from_config(batch: &BatchSection) -> Self {
        Self {
            top_k: batch.top_k,
            enable_confidence_stratification: batch.enable_confidence_stratification,
            item_timeout: batch.item_timeout_secs.map(Duration::from_secs),
        }
    }
}

/// Everything the pipeline computed for one structure
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub detected_count: usize,
    pub filtered_count: usize,
    /// Full rescored list, best first
    pub ranked: Vec<ScoredCandidate>,
    pub top_k: Vec<RankedCandidate>,
    pub cliff: Option<CliffAnalysis>,
}

impl PipelineOutcome {
    pub fn into_item_result(
        self,
        name: impl Into<String>,
        path: &Path,
        processing_time: Duration,
    ) -> BatchItemResult {
        BatchItemResult {
            name: name.into(),
            path: path.to_path_buf(),
            status: ItemStatus::Success,
            error: None,
            detected_count: self.detected_count,
            filtered_count: self.filtered_count,
            top_k: self.top_k,
            processing_time,
            cliff_summary: self.cliff.as_ref().map(CliffAnalysis::summary),
        }
    }
}

/// Composes the detection and rescoring collaborators with clustering and cliff analysis
#[derive(Clone)]
pub struct StructurePipeline {
    detector: Arc<dyn Detector>,
    rescorer: Arc<dyn Rescorer>,
    clusterer: OverlapClusterer,
    settings: PipelineSettings,
}

impl StructurePipeline {
    pub fn new(
        detector: Arc<dyn Detector>,
        rescorer: Arc<dyn Rescorer>,
        clusterer: OverlapClusterer,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            detector,
            rescorer,
            clusterer,
            settings,
        }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Run all stages for one structure
    pub async fn run(
        &self,
        name: &str,
        structure: &Path,
        workdir: &Path,
    ) -> Result<PipelineOutcome, PipelineError> {
        tokio::fs::create_dir_all(workdir).await?;

        let detected = self
            .with_timeout("detection", self.detector.detect(structure, workdir))
            .await?;
        let filtered = self.clusterer.deduplicate(&detected);
        debug!(
            structure = name,
            detected = detected.len(),
            filtered = filtered.len(),
            "Detection and clustering complete"
        );

        let rescored = if filtered.is_empty() {
            debug!(structure = name, "No candidates left, skipping rescoring");
            Vec::new()
        } else {
            self.with_timeout(
                "rescoring",
                self.rescorer.rescore(&filtered, structure, workdir),
            )
            .await?
        };

        let (ranked, top_k, cliff) = self.rank(name, rescored)?;

        info!(
            structure = name,
            detected = detected.len(),
            filtered = filtered.len(),
            kept = top_k.len(),
            high_confidence = cliff.as_ref().map(|c| c.high_confidence_count),
            "Structure processed"
        );

        Ok(PipelineOutcome {
            detected_count: detected.len(),
            filtered_count: filtered.len(),
            ranked,
            top_k,
            cliff,
        })
    }

    /// Run and convert the outcome (or the error) into a batch item result
    pub async fn process(&self, name: &str, structure: &Path, workdir: &Path) -> BatchItemResult {
        let start = Instant::now();
        match self.run(name, structure, workdir).await {
            Ok(outcome) => outcome.into_item_result(name, structure, start.elapsed()),
            Err(e) => {
                warn!(structure = name, error = %e, "Structure failed");
                BatchItemResult::failed(name, structure, e.to_string(), start.elapsed())
            }
        }
    }

    /// Sort by rescoring score, cut to top-K and record rank changes
    ///
    /// `original_rank` is the position by `raw_score` within the full
    /// rescored list, so it stays comparable with the final rank.
    #[allow(clippy::type_complexity)]
    fn rank(
        &self,
        name: &str,
        rescored: Vec<ScoredCandidate>,
    ) -> Result<(Vec<ScoredCandidate>, Vec<RankedCandidate>, Option<CliffAnalysis>), PipelineError>
    {
        let n = rescored.len();

        let mut by_raw: Vec<usize> = (0..n).collect();
        by_raw.sort_by(|&a, &b| rescored[b].raw_score().total_cmp(&rescored[a].raw_score()));
        let mut original_rank = vec![0usize; n];
        for (pos, &idx) in by_raw.iter().enumerate() {
            original_rank[idx] = pos + 1;
        }

        let mut by_score: Vec<usize> = (0..n).collect();
        by_score.sort_by(|&a, &b| rescored[b].score.total_cmp(&rescored[a].score));

        let cliff = if self.settings.enable_confidence_stratification && n > 0 {
            Some(analyze_cliff(&rescored, name)?)
        } else {
            None
        };
        let high_confidence = cliff.as_ref().map(|c| c.high_confidence_count).unwrap_or(0);

        let top_k = by_score
            .iter()
            .take(self.settings.top_k)
            .enumerate()
            .map(|(i, &idx)| {
                let rank = i + 1;
                RankedCandidate {
                    rank,
                    scored: rescored[idx].clone(),
                    original_rank: original_rank[idx],
                    rank_change: original_rank[idx] as i64 - rank as i64,
                    is_high_confidence: i < high_confidence,
                }
            })
            .collect();

        let ranked = by_score.iter().map(|&idx| rescored[idx].clone()).collect();
        Ok((ranked, top_k, cliff))
    }

    async fn with_timeout<T, E, F>(&self, stage: &'static str, fut: F) -> Result<T, PipelineError>
    where
        F: Future<Output = Result<T, E>>,
        PipelineError: From<E>,
    {
        match self.settings.item_timeout {
            Some(limit) => match tokio::time::timeout(limit, fut).await {
                Ok(result) => result.map_err(PipelineError::from),
                Err(_) => Err(PipelineError::Timeout { stage, limit }),
            },
            None => fut.await.map_err(PipelineError::from),
        }
    }
}
