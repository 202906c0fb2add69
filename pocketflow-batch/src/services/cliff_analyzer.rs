//! Cliff analysis (confidence stratification)
//!
//! Sorts rescored candidates by score and splits the list at the largest
//! drop between consecutive scores. Everything above the drop is the
//! high-confidence set.

use crate::models::{CliffSummary, ScoredCandidate};
use std::collections::BTreeMap;
use thiserror::Error;

/// Number of leading scores shown by [`CliffAnalysis::format_report`]
const REPORT_SCORE_PREVIEW: usize = 5;

/// Cliff analyzer errors
#[derive(Debug, Error)]
pub enum CliffError {
    /// Empty candidate list
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result of cliff analysis over one structure's rescored candidates
#[derive(Debug, Clone, PartialEq)]
pub struct CliffAnalysis {
    pub structure_id: String,
    /// Display identifier per ranked candidate, best first
    pub ranked_ids: Vec<String>,
    /// Scores, descending
    pub scores: Vec<f64>,
    /// `scores[k] - scores[k + 1]`
    pub deltas: Vec<f64>,
    pub max_delta: f64,
    pub cliff_index: usize,
    pub high_confidence_count: usize,
    pub is_top1_dominant: bool,
    pub top1_score: f64,
    pub top1_id: String,
}

/// Display identifier: `Pocket_<rank>_<x>_<y>_<z>` with one decimal place
pub fn candidate_display_id(rank: usize, candidate: &ScoredCandidate) -> String {
    let c = candidate.center();
    format!("Pocket_{}_{:.1}_{:.1}_{:.1}", rank, c.x, c.y, c.z)
}

/// Stable descending sort by rescoring score
pub fn sort_by_score_desc(scored: &mut [ScoredCandidate]) {
    scored.sort_by(|a, b| b.score.total_cmp(&a.score));
}

/// Run cliff analysis on a non-empty candidate list (any order)
pub fn analyze_cliff(
    scored: &[ScoredCandidate],
    structure_id: &str,
) -> Result<CliffAnalysis, CliffError> {
    if scored.is_empty() {
        return Err(CliffError::InvalidInput(format!(
            "no scored candidates for {}",
            structure_id
        )));
    }

    let mut ranked = scored.to_vec();
    sort_by_score_desc(&mut ranked);

    let scores: Vec<f64> = ranked.iter().map(|c| c.score).collect();
    let deltas: Vec<f64> = scores.windows(2).map(|w| w[0] - w[1]).collect();

    // First index wins on ties: the smallest high-confidence set
    let mut cliff_index = 0;
    let mut max_delta = 0.0;
    if let Some(&first) = deltas.first() {
        max_delta = first;
        for (k, &delta) in deltas.iter().enumerate().skip(1) {
            if delta > max_delta {
                max_delta = delta;
                cliff_index = k;
            }
        }
    }

    let high_confidence_count = cliff_index + 1;
    let ranked_ids: Vec<String> = ranked
        .iter()
        .enumerate()
        .map(|(i, c)| candidate_display_id(i + 1, c))
        .collect();

    Ok(CliffAnalysis {
        structure_id: structure_id.to_string(),
        top1_id: ranked_ids[0].clone(),
        top1_score: scores[0],
        ranked_ids,
        scores,
        deltas,
        max_delta,
        cliff_index,
        high_confidence_count,
        is_top1_dominant: high_confidence_count == 1,
    })
}

impl CliffAnalysis {
    /// Identifiers of the candidates above the cliff
    pub fn high_confidence_ids(&self) -> &[String] {
        &self.ranked_ids[..self.high_confidence_count]
    }

    /// Fields carried into a batch item result
    pub fn summary(&self) -> CliffSummary {
        CliffSummary {
            high_confidence_count: self.high_confidence_count,
            is_top1_dominant: self.is_top1_dominant,
            max_delta: self.max_delta,
            cliff_index: self.cliff_index,
            top1_score: self.top1_score,
            high_confidence_ids: self.high_confidence_ids().to_vec(),
        }
    }

    /// Multi-line console report
    pub fn format_report(&self) -> String {
        let mut lines = vec![
            format!("=== Cliff analysis: {} ===", self.structure_id),
            format!("Top1 candidate: {}", self.top1_id),
            format!("Top1 score: {:.4}", self.top1_score),
            format!("High-confidence count: {}", self.high_confidence_count),
            format!("High-confidence set: [{}]", self.high_confidence_ids().join(", ")),
            format!("Top1 dominant: {}", self.is_top1_dominant),
            format!("Max delta: {:.4}", self.max_delta),
            format!("Cliff index: {}", self.cliff_index),
        ];

        if self.scores.len() > 1 {
            lines.push(format!(
                "Scores: {}",
                preview(&self.scores, REPORT_SCORE_PREVIEW)
            ));
            lines.push(format!(
                "Deltas: {}",
                preview(&self.deltas, REPORT_SCORE_PREVIEW - 1)
            ));
        }

        lines.join("\n")
    }
}

fn preview(values: &[f64], limit: usize) -> String {
    let shown: Vec<String> = values.iter().take(limit).map(|v| format!("{:.4}", v)).collect();
    let ellipsis = if values.len() > limit { "..." } else { "" };
    format!("[{}]{}", shown.join(", "), ellipsis)
}

/// Aggregate stratification statistics over many structures
#[derive(Debug, Clone, PartialEq)]
pub struct CliffStatistics {
    pub total: usize,
    pub top1_dominant_count: usize,
    pub top1_dominant_percentage: f64,
    pub mean_high_confidence_count: f64,
    pub mean_max_delta: f64,
    /// high_confidence_count → number of structures
    pub distribution: BTreeMap<usize, usize>,
}

impl CliffStatistics {
    /// Aggregate summaries; `None` when there are none
    pub fn from_summaries<'a, I>(summaries: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a CliffSummary>,
    {
        let mut total = 0usize;
        let mut dominant = 0usize;
        let mut hc_sum = 0usize;
        let mut delta_sum = 0.0;
        let mut distribution = BTreeMap::new();

        for summary in summaries {
            total += 1;
            if summary.is_top1_dominant {
                dominant += 1;
            }
            hc_sum += summary.high_confidence_count;
            delta_sum += summary.max_delta;
            *distribution.entry(summary.high_confidence_count).or_insert(0) += 1;
        }

        if total == 0 {
            return None;
        }

        let n = total as f64;
        Some(Self {
            total,
            top1_dominant_count: dominant,
            top1_dominant_percentage: dominant as f64 / n * 100.0,
            mean_high_confidence_count: hc_sum as f64 / n,
            mean_max_delta: delta_sum / n,
            distribution,
        })
    }
}
