//! Batch statistics
//!
//! [`BatchProgress`] tracks items while workers run; [`BatchSummary`] is
//! computed once after all workers have joined.

use crate::models::{BatchItemResult, ItemStatus};
use crate::services::CliffStatistics;
use pocketflow_common::human_time::format_duration;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Live progress counters
///
/// Display: "Processing X to Y of Z"
/// - X = completed items
/// - Y = started items (completed + in progress)
/// - Z = total discovered items
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchProgress {
    pub completed: usize,
    pub started: usize,
    pub total: usize,
    pub failed: usize,
}

impl BatchProgress {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Default::default()
        }
    }

    pub fn record_started(&mut self) {
        self.started += 1;
    }

    pub fn record_completed(&mut self, failed: bool) {
        self.completed += 1;
        if failed {
            self.failed += 1;
        }
    }

    pub fn display_string(&self) -> String {
        format!(
            "Processing {} to {} of {}",
            self.completed, self.started, self.total
        )
    }
}

/// Aggregate statistics over a finished batch
#[derive(Debug, Clone, PartialEq)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub total_processing_time: Duration,
    /// Stratification statistics over successful items carrying a cliff summary
    pub cliff: Option<CliffStatistics>,
    /// `(name, error)` per failed item, in discovery order
    pub failures: Vec<(String, String)>,
}

impl BatchSummary {
    pub fn from_results(results: &[BatchItemResult]) -> Self {
        let count = |status: ItemStatus| results.iter().filter(|r| r.status == status).count();

        let cliff = CliffStatistics::from_summaries(
            results
                .iter()
                .filter(|r| r.is_success())
                .filter_map(|r| r.cliff_summary.as_ref()),
        );

        let failures = results
            .iter()
            .filter(|r| r.is_failed())
            .map(|r| (r.name.clone(), r.error.clone().unwrap_or_default()))
            .collect();

        Self {
            total: results.len(),
            succeeded: count(ItemStatus::Success),
            failed: count(ItemStatus::Failed),
            skipped: count(ItemStatus::Skipped),
            total_processing_time: results.iter().map(|r| r.processing_time).sum(),
            cliff,
            failures,
        }
    }

    /// Success rate in percent (0.0 for an empty batch)
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.succeeded as f64 / self.total as f64 * 100.0
        }
    }

    pub fn mean_processing_time(&self) -> Duration {
        if self.total == 0 {
            Duration::ZERO
        } else {
            match u32::try_from(self.total) {
                Ok(n) => self.total_processing_time / n,
                Err(_) => Duration::from_secs_f64(
                    self.total_processing_time.as_secs_f64() / self.total as f64,
                ),
            }
        }
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }

    pub fn display_lines(&self) -> Vec<String> {
        let mut lines = vec![
            format!("Total structures: {}", self.total),
            format!("Succeeded: {}", self.succeeded),
            format!("Failed: {}", self.failed),
            format!("Success rate: {:.1}%", self.success_rate()),
            format!(
                "Processing time: {} total, {} mean",
                format_duration(self.total_processing_time),
                format_duration(self.mean_processing_time())
            ),
        ];
        if self.skipped > 0 {
            lines.insert(3, format!("Skipped: {}", self.skipped));
        }

        if let Some(cliff) = &self.cliff {
            lines.push(format!(
                "Top1 dominant: {} of {} ({:.1}%)",
                cliff.top1_dominant_count, cliff.total, cliff.top1_dominant_percentage
            ));
            lines.push(format!(
                "Mean high-confidence count: {:.2}",
                cliff.mean_high_confidence_count
            ));
            lines.push(format!("Mean max delta: {:.4}", cliff.mean_max_delta));
            let distribution = cliff
                .distribution
                .iter()
                .map(|(count, items)| format!("{}: {}", count, items))
                .collect::<Vec<_>>()
                .join(", ");
            lines.push(format!("High-confidence distribution: {}", distribution));
        }

        for (name, error) in &self.failures {
            lines.push(format!("FAILED {}: {}", name, error));
        }
        lines
    }
}
