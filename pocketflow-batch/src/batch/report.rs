//! CSV reports
//!
//! - Aggregate report: one row per structure, in discovery order.
//! - Detailed report: one row per top-K candidate, then a cliff summary block.

use crate::models::{BatchItemResult, CliffSummary};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Candidates spelled out per row of the aggregate report
const AGGREGATE_TOP_CANDIDATES: usize = 3;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error writing {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Report buffer error: {0}")]
    Buffer(String),
}

/// Aggregate report header
pub fn aggregate_header() -> Vec<String> {
    let mut header: Vec<String> = [
        "protein_name",
        "protein_path",
        "status",
        "error_message",
        "num_pockets_detected",
        "num_pockets_filtered",
        "processing_time",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    for i in 1..=AGGREGATE_TOP_CANDIDATES {
        for field in ["score", "center_x", "center_y", "center_z"] {
            header.push(format!("top_pocket_{}_{}", i, field));
        }
    }

    header.extend(
        ["high_confidence_count", "is_top1_dominant", "max_delta", "cliff_index"]
            .iter()
            .map(|s| s.to_string()),
    );
    header
}

fn aggregate_row(result: &BatchItemResult) -> Vec<String> {
    let mut row = vec![
        result.name.clone(),
        result.path.display().to_string(),
        result.status.as_str().to_string(),
        result.error.clone().unwrap_or_default(),
        result.detected_count.to_string(),
        result.filtered_count.to_string(),
        format!("{:.2}", result.processing_time.as_secs_f64()),
    ];

    for i in 0..AGGREGATE_TOP_CANDIDATES {
        match result.top_k.get(i) {
            Some(ranked) => {
                let c = ranked.scored.center();
                row.push(format!("{:.4}", ranked.scored.score));
                row.push(format!("{:.3}", c.x));
                row.push(format!("{:.3}", c.y));
                row.push(format!("{:.3}", c.z));
            }
            None => row.extend(std::iter::repeat(String::new()).take(4)),
        }
    }

    match &result.cliff_summary {
        Some(cliff) => {
            row.push(cliff.high_confidence_count.to_string());
            row.push(cliff.is_top1_dominant.to_string());
            row.push(format!("{:.4}", cliff.max_delta));
            row.push(cliff.cliff_index.to_string());
        }
        None => row.extend(std::iter::repeat(String::new()).take(4)),
    }

    row
}

/// Render the aggregate report (header only when `results` is empty)
pub fn render_aggregate(results: &[BatchItemResult]) -> Result<String, ReportError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(aggregate_header())?;
    for result in results {
        writer.write_record(aggregate_row(result))?;
    }
    into_string(writer)
}

/// Write the aggregate report, creating parent directories
pub fn write_aggregate(results: &[BatchItemResult], path: &Path) -> Result<(), ReportError> {
    let content = render_aggregate(results)?;
    write_file(path, &content)
}

/// Detailed report header
pub const DETAILED_HEADER: [&str; 10] = [
    "pocket_name",
    "rank",
    "score",
    "center_x",
    "center_y",
    "center_z",
    "raw_score",
    "original_rank",
    "rank_change",
    "is_high_confidence",
];

/// Render the per-structure report
pub fn render_detailed(result: &BatchItemResult) -> Result<String, ReportError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(DETAILED_HEADER)?;

    for ranked in &result.top_k {
        let c = ranked.scored.center();
        writer.write_record([
            ranked.pocket_name(),
            ranked.rank.to_string(),
            format!("{:.4}", ranked.scored.score),
            format!("{:.3}", c.x),
            format!("{:.3}", c.y),
            format!("{:.3}", c.z),
            format!("{:.4}", ranked.scored.raw_score()),
            ranked.original_rank.to_string(),
            ranked.rank_change_display(),
            ranked.is_high_confidence.to_string(),
        ])?;
    }

    let mut content = into_string(writer)?;
    if let Some(cliff) = &result.cliff_summary {
        content.push_str("\n\n");
        content.push_str(&render_cliff_block(cliff)?);
    }
    Ok(content)
}

fn render_cliff_block(cliff: &CliffSummary) -> Result<String, ReportError> {
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_writer(Vec::new());

    writer.write_record(["=== Cliff analysis summary ==="])?;
    writer.write_record(["item", "value"])?;
    let rows = [
        ("high_confidence_count", cliff.high_confidence_count.to_string()),
        ("is_top1_dominant", cliff.is_top1_dominant.to_string()),
        ("max_delta", format!("{:.4}", cliff.max_delta)),
        ("cliff_index", cliff.cliff_index.to_string()),
        ("top1_score", format!("{:.4}", cliff.top1_score)),
        ("high_confidence_ids", cliff.high_confidence_ids.join(", ")),
    ];
    for (item, value) in rows {
        writer.write_record([item, value.as_str()])?;
    }
    into_string(writer)
}

/// Write `<dir>/<name>_pocket_results.csv` and return its path
pub fn write_detailed(result: &BatchItemResult, dir: &Path) -> Result<PathBuf, ReportError> {
    let path = detailed_report_path(dir, &result.name);
    let content = render_detailed(result)?;
    write_file(&path, &content)?;
    Ok(path)
}

pub fn detailed_report_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{}_pocket_results.csv", name))
}

fn into_string(writer: csv::Writer<Vec<u8>>) -> Result<String, ReportError> {
    let bytes = writer
        .into_inner()
        .map_err(|e| ReportError::Buffer(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| ReportError::Buffer(e.to_string()))
}

fn write_file(path: &Path, content: &str) -> Result<(), ReportError> {
    let io_err = |source| ReportError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
    }
    std::fs::write(path, content).map_err(io_err)
}
