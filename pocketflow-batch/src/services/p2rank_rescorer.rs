//! P2Rank-backed rescoring
//!
//! Runs `prank rescore` on the fpocket output for a structure and reads the
//! rescored centers back from the predictions CSV.

use crate::models::{Candidate, Center, ScoredCandidate};
use crate::services::fpocket_detector::fpocket_output_dir;
use crate::services::tool_locator::{P2RankHome, P2RANK_HOME_ENV};
use crate::types::{Rescorer, RescoringError};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info};

const TOOL_NAME: &str = "p2rank";

/// Max distance between a prediction and a detected candidate to count as the same site
pub const MATCH_DISTANCE: f64 = 1.0;

/// Columns read from `<name>_predictions.csv`; other columns are ignored
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PredictionRow {
    pub center_x: f64,
    pub center_y: f64,
    pub center_z: f64,
    pub score: f64,
}

impl PredictionRow {
    pub fn center(&self) -> Center {
        Center::new(self.center_x, self.center_y, self.center_z)
    }
}

/// Rescorer invoking the P2Rank launcher from a resolved home
pub struct P2RankRescorer {
    home: P2RankHome,
}

impl P2RankRescorer {
    pub fn new(home: P2RankHome) -> Self {
        Self { home }
    }

    pub fn home(&self) -> &P2RankHome {
        &self.home
    }
}

#[async_trait]
impl Rescorer for P2RankRescorer {
    fn name(&self) -> &'static str {
        TOOL_NAME
    }

    async fn rescore(
        &self,
        candidates: &[Candidate],
        structure: &Path,
        workdir: &Path,
    ) -> Result<Vec<ScoredCandidate>, RescoringError> {
        let script = self.home.prank_script();
        if !script.is_file() {
            return Err(RescoringError::NotInstalled(script.display().to_string()));
        }

        let out_dir = workdir.join("p2rank_out");
        tokio::fs::create_dir_all(&out_dir).await?;

        let fpocket_file = locate_fpocket_structure(structure, workdir)?;
        let dataset = out_dir.join("fpocket_dataset.ds");
        write_dataset(&dataset, &fpocket_file, structure)?;

        debug!(structure = %structure.display(), dataset = %dataset.display(), "Running P2Rank rescore");
        let output = Command::new(&script)
            .arg("rescore")
            .arg(&dataset)
            .arg("-o")
            .arg(&out_dir)
            .env(P2RANK_HOME_ENV, self.home.root())
            .output()
            .await
            .map_err(|e| RescoringError::Launch {
                tool: TOOL_NAME.to_string(),
                message: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(RescoringError::ToolFailed {
                tool: TOOL_NAME.to_string(),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let predictions_path = locate_predictions(&out_dir, structure)?;
        let rows = parse_predictions(&predictions_path)?;
        let scored = match_predictions(&rows, candidates);

        info!(
            structure = %structure.display(),
            rescored = scored.len(),
            "P2Rank rescoring complete"
        );
        Ok(scored)
    }
}

/// The `<stem>_out.pdb` (or `.cif`) fpocket left in the item's work directory
fn locate_fpocket_structure(structure: &Path, workdir: &Path) -> Result<PathBuf, RescoringError> {
    let dir = fpocket_output_dir(structure, workdir);
    let stem = structure
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    ["pdb", "cif"]
        .iter()
        .map(|ext| dir.join(format!("{}_out.{}", stem, ext)))
        .find(|p| p.is_file())
        .ok_or_else(|| RescoringError::MissingOutput(dir.join(format!("{}_out.pdb", stem))))
}

fn locate_predictions(out_dir: &Path, structure: &Path) -> Result<PathBuf, RescoringError> {
    let file_name = structure
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let named = out_dir.join(format!("{}_predictions.csv", file_name));
    if named.is_file() {
        return Ok(named);
    }
    let fallback = out_dir.join("predictions.csv");
    if fallback.is_file() {
        return Ok(fallback);
    }
    Err(RescoringError::MissingOutput(named))
}

/// Write a single-entry P2Rank rescore dataset with absolute paths
pub fn write_dataset(dataset: &Path, prediction: &Path, structure: &Path) -> Result<(), RescoringError> {
    let prediction = absolute(prediction)?;
    let structure = absolute(structure)?;
    let content = format!(
        "PARAM.PREDICTION_METHOD=fpocket\nHEADER: prediction protein\n{}  {}\n",
        prediction.display(),
        structure.display()
    );
    std::fs::write(dataset, content)?;
    Ok(())
}

fn absolute(path: &Path) -> std::io::Result<PathBuf> {
    path.canonicalize()
        .or_else(|_| std::env::current_dir().map(|cwd| cwd.join(path)))
}

/// Read prediction rows; headers and values may carry padding spaces
pub fn parse_predictions(path: &Path) -> Result<Vec<PredictionRow>, RescoringError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| RescoringError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

    reader
        .deserialize::<PredictionRow>()
        .map(|row| {
            row.map_err(|e| RescoringError::Parse {
                path: path.to_path_buf(),
                message: e.to_string(),
            })
        })
        .collect()
}

/// Attach each prediction to the nearest detected candidate within [`MATCH_DISTANCE`]
///
/// The rescored center is kept. Unmatched predictions get `raw_score = 0`
/// and no residues.
pub fn match_predictions(rows: &[PredictionRow], candidates: &[Candidate]) -> Vec<ScoredCandidate> {
    rows.iter()
        .map(|row| {
            let center = row.center();
            let nearest = candidates
                .iter()
                .map(|c| (c, c.center.distance_to(&center)))
                .filter(|(_, d)| *d <= MATCH_DISTANCE)
                .min_by(|a, b| a.1.total_cmp(&b.1));

            let candidate = match nearest {
                Some((matched, _)) => Candidate {
                    center,
                    raw_score: matched.raw_score,
                    membership: matched.membership.clone(),
                },
                None => Candidate::new(center, 0.0),
            };
            candidate.scored(row.score)
        })
        .collect()
}
