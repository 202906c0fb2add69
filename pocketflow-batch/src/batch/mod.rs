//! Batch coordinator
//!
//! Discovers structure files, runs the per-structure pipeline over a fixed
//! pool of worker tasks and writes the aggregate report.
//!
//! # Flow
//! 1. Scan the input root (fatal if missing)
//! 2. Create the output root and build the shared pipeline (fatal if the
//!    rescoring tool cannot be resolved)
//! 3. Workers pull jobs from a shared queue and send `(index, result)` back
//! 4. After the join barrier, results are ordered by discovery index and
//!    the aggregate report is written
//!
//! Failures inside one structure never leave that structure's result.

pub mod report;
pub mod statistics;

use crate::error::{BatchError, BatchResult};
use crate::models::BatchItemResult;
use crate::services::{FileScanner, ScanError};
use crate::workflow::{PipelineFactory, StructurePipeline};
use chrono::Utc;
use futures::FutureExt;
use pocketflow_common::config::BatchSection;
use pocketflow_common::events::{BatchEvent, EventBus};
use std::collections::{HashMap, HashSet};
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub use statistics::{BatchProgress, BatchSummary};

/// What to process and where to put it
#[derive(Debug, Clone, PartialEq)]
pub struct BatchRequest {
    pub input_root: PathBuf,
    pub output_root: PathBuf,
    /// Aggregate CSV report
    pub report_path: PathBuf,
    pub file_extensions: Vec<String>,
    pub max_workers: usize,
}

impl BatchRequest {
    pub fn from_config(input_root: impl Into<PathBuf>, batch: &BatchSection) -> Self {
        Self {
            input_root: input_root.into(),
            output_root: batch.output_root.clone(),
            report_path: batch.output_report_path.clone(),
            file_extensions: batch.file_extensions.clone(),
            max_workers: batch.effective_max_workers(),
        }
    }
}

/// Results of a completed batch
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub run_id: Uuid,
    /// One result per discovered file, in discovery order
    pub results: Vec<BatchItemResult>,
    pub summary: BatchSummary,
    pub report_path: PathBuf,
    pub elapsed: Duration,
}

impl BatchOutcome {
    pub fn has_failures(&self) -> bool {
        !self.summary.all_succeeded()
    }
}

/// One unit of work
#[derive(Debug, Clone)]
struct Job {
    index: usize,
    name: String,
    path: PathBuf,
    output_dir: PathBuf,
}

/// Per-structure output directory: `<output_root>/<relative parent>/<stem>/`
pub fn output_dir_for(input_root: &Path, output_root: &Path, structure: &Path) -> PathBuf {
    let stem = structure_name(structure);
    let relative_parent = structure
        .strip_prefix(input_root)
        .ok()
        .and_then(Path::parent)
        .map(Path::to_path_buf)
        .unwrap_or_default();
    output_root.join(relative_parent).join(stem)
}

/// Output directories for a discovery list, one per file and all distinct
///
/// Files sharing a stem in the same directory (`1abc.pdb`, `1abc.cif`) get
/// the extension appended (`1abc_pdb/`, `1abc_cif/`). Any remaining clash
/// gets a numeric suffix.
pub fn assign_output_dirs(input_root: &Path, output_root: &Path, files: &[PathBuf]) -> Vec<PathBuf> {
    let mut stem_counts: HashMap<PathBuf, usize> = HashMap::new();
    for path in files {
        *stem_counts
            .entry(output_dir_for(input_root, output_root, path))
            .or_default() += 1;
    }

    let mut taken: HashSet<PathBuf> = HashSet::with_capacity(files.len());
    files
        .iter()
        .map(|path| {
            let base = output_dir_for(input_root, output_root, path);
            let mut dir = if stem_counts.get(&base).copied().unwrap_or(0) > 1 {
                let extension = path
                    .extension()
                    .map(|e| e.to_string_lossy().into_owned())
                    .unwrap_or_default();
                base.with_file_name(format!("{}_{}", structure_name(path), extension))
            } else {
                base
            };

            let first_choice = dir.clone();
            let dir_name = first_choice
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let mut suffix = 2;
            while taken.contains(&dir) {
                dir = first_choice.with_file_name(format!("{}_{}", dir_name, suffix));
                suffix += 1;
            }
            taken.insert(dir.clone());
            dir
        })
        .collect()
}

/// Structure name used in reports (file stem)
pub fn structure_name(structure: &Path) -> String {
    structure
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| structure.display().to_string())
}

/// Fans structures out over a bounded worker pool
pub struct BatchCoordinator {
    factory: Arc<dyn PipelineFactory>,
    event_bus: EventBus,
}

impl BatchCoordinator {
    pub fn new(factory: Arc<dyn PipelineFactory>, event_bus: EventBus) -> Self {
        Self { factory, event_bus }
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    pub async fn run(&self, request: &BatchRequest) -> BatchResult<BatchOutcome> {
        let start = Instant::now();
        let run_id = Uuid::new_v4();

        let files = FileScanner::with_extensions(&request.file_extensions)
            .scan(&request.input_root)
            .map_err(|e| match e {
                ScanError::PathNotFound(p) | ScanError::NotADirectory(p) => {
                    BatchError::InputNotFound(p)
                }
            })?;

        info!(
            %run_id,
            input = %request.input_root.display(),
            files = files.len(),
            "Discovered structure files"
        );

        if files.is_empty() {
            warn!(
                input = %request.input_root.display(),
                extensions = ?request.file_extensions,
                "No structure files found"
            );
            return self.finish(run_id, request, Vec::new(), start);
        }

        tokio::fs::create_dir_all(&request.output_root).await?;
        let pipeline = Arc::new(
            self.factory
                .create()
                .map_err(|e| BatchError::ToolUnavailable(e.to_string()))?,
        );

        let output_dirs = assign_output_dirs(&request.input_root, &request.output_root, &files);
        let jobs: Vec<Job> = files
            .iter()
            .zip(output_dirs)
            .enumerate()
            .map(|(index, (path, output_dir))| Job {
                index,
                name: structure_name(path),
                path: path.clone(),
                output_dir,
            })
            .collect();

        let worker_count = request.max_workers.clamp(1, jobs.len());
        self.event_bus.emit_lossy(BatchEvent::BatchStarted {
            run_id,
            total_items: jobs.len(),
            max_workers: worker_count,
            timestamp: Utc::now(),
        });

        let results = self.execute(run_id, pipeline, &jobs, worker_count).await;
        self.finish(run_id, request, results, start)
    }

    /// Run all jobs and return results in discovery order
    async fn execute(
        &self,
        run_id: Uuid,
        pipeline: Arc<StructurePipeline>,
        jobs: &[Job],
        worker_count: usize,
    ) -> Vec<BatchItemResult> {
        let total = jobs.len();
        let (job_tx, job_rx) = mpsc::unbounded_channel::<Job>();
        let job_rx = Arc::new(Mutex::new(job_rx));
        let (result_tx, mut result_rx) = mpsc::unbounded_channel::<(usize, BatchItemResult)>();

        for job in jobs {
            if job_tx.send(job.clone()).is_err() {
                warn!("Job queue closed before all jobs were queued");
                break;
            }
        }
        drop(job_tx);

        let mut workers = JoinSet::new();
        for worker_id in 0..worker_count {
            let job_rx = Arc::clone(&job_rx);
            let result_tx = result_tx.clone();
            let pipeline = Arc::clone(&pipeline);
            let event_bus = self.event_bus.clone();

            workers.spawn(async move {
                loop {
                    let next = job_rx.lock().await.recv().await;
                    let Some(job) = next else { break };

                    event_bus.emit_lossy(BatchEvent::ItemStarted {
                        run_id,
                        index: job.index,
                        name: job.name.clone(),
                        timestamp: Utc::now(),
                    });

                    let result = process_job(&pipeline, &job).await;
                    if result_tx.send((job.index, result)).is_err() {
                        break;
                    }
                }
                debug!(worker_id, "Worker finished");
            });
        }
        drop(result_tx);

        let mut slots: Vec<Option<BatchItemResult>> = vec![None; total];
        let mut completed = 0;
        while let Some((index, result)) = result_rx.recv().await {
            completed += 1;
            self.event_bus.emit_lossy(BatchEvent::ItemCompleted {
                run_id,
                index,
                name: result.name.clone(),
                status: result.status.as_str().to_string(),
                error: result.error.clone(),
                completed,
                total,
                elapsed_seconds: result.processing_time.as_secs_f64(),
                timestamp: Utc::now(),
            });
            if let Some(slot) = slots.get_mut(index) {
                *slot = Some(result);
            }
        }

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Worker task ended abnormally");
            }
        }

        slots
            .into_iter()
            .zip(jobs)
            .map(|(slot, job)| {
                slot.unwrap_or_else(|| {
                    BatchItemResult::failed(
                        job.name.clone(),
                        job.path.clone(),
                        "worker exited before reporting a result",
                        Duration::ZERO,
                    )
                })
            })
            .collect()
    }

    fn finish(
        &self,
        run_id: Uuid,
        request: &BatchRequest,
        results: Vec<BatchItemResult>,
        start: Instant,
    ) -> BatchResult<BatchOutcome> {
        report::write_aggregate(&results, &request.report_path)?;
        let summary = BatchSummary::from_results(&results);
        let elapsed = start.elapsed();

        info!(
            %run_id,
            total = summary.total,
            succeeded = summary.succeeded,
            failed = summary.failed,
            report = %request.report_path.display(),
            "Batch complete"
        );

        self.event_bus.emit_lossy(BatchEvent::BatchCompleted {
            run_id,
            total: summary.total,
            succeeded: summary.succeeded,
            failed: summary.failed,
            elapsed_seconds: elapsed.as_secs_f64(),
            timestamp: Utc::now(),
        });

        Ok(BatchOutcome {
            run_id,
            results,
            summary,
            report_path: request.report_path.clone(),
            elapsed,
        })
    }
}

/// Run one structure and write its detailed report; never panics outward
async fn process_job(pipeline: &StructurePipeline, job: &Job) -> BatchItemResult {
    let start = Instant::now();
    let work = async {
        let result = pipeline.process(&job.name, &job.path, &job.output_dir).await;
        if !result.is_success() {
            return result;
        }
        match report::write_detailed(&result, &job.output_dir) {
            Ok(path) => {
                debug!(structure = %job.name, report = %path.display(), "Detailed report written");
                result
            }
            Err(e) => BatchItemResult::failed(
                job.name.clone(),
                job.path.clone(),
                format!("Failed to write detailed report: {}", e),
                result.processing_time,
            ),
        }
    };

    match AssertUnwindSafe(work).catch_unwind().await {
        Ok(result) => result,
        Err(panic) => {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            error!(structure = %job.name, %message, "Structure pipeline panicked");
            BatchItemResult::failed(
                job.name.clone(),
                job.path.clone(),
                format!("panic: {}", message),
                start.elapsed(),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_dir_mirrors_input_tree() {
        let dir = output_dir_for(
            Path::new("/data/in"),
            Path::new("/data/out"),
            Path::new("/data/in/kinases/human/1abc.pdb"),
        );
        assert_eq!(dir, PathBuf::from("/data/out/kinases/human/1abc"));

        let top = output_dir_for(
            Path::new("/data/in"),
            Path::new("results"),
            Path::new("/data/in/2xyz.cif"),
        );
        assert_eq!(top, PathBuf::from("results/2xyz"));
    }

    #[test]
    fn test_same_stem_siblings_get_distinct_dirs() {
        let root = Path::new("/data/in");
        let files = vec![
            PathBuf::from("/data/in/1abc.cif"),
            PathBuf::from("/data/in/1abc.pdb"),
            PathBuf::from("/data/in/2xyz.pdb"),
            PathBuf::from("/data/in/sub/1abc.pdb"),
        ];
        let dirs = assign_output_dirs(root, Path::new("/out"), &files);
        assert_eq!(
            dirs,
            vec![
                PathBuf::from("/out/1abc_cif"),
                PathBuf::from("/out/1abc_pdb"),
                PathBuf::from("/out/2xyz"),
                PathBuf::from("/out/sub/1abc"),
            ]
        );
    }

    #[test]
    fn test_disambiguated_name_clash_gets_numeric_suffix() {
        let root = Path::new("/data/in");
        let files = vec![
            PathBuf::from("/data/in/1abc.pdb"),
            PathBuf::from("/data/in/1abc.cif"),
            PathBuf::from("/data/in/1abc_pdb.pdb"),
        ];
        let dirs = assign_output_dirs(root, Path::new("/out"), &files);
        let unique: HashSet<&PathBuf> = dirs.iter().collect();
        assert_eq!(unique.len(), 3);
        assert_eq!(dirs[0], PathBuf::from("/out/1abc_pdb"));
        assert_eq!(dirs[2], PathBuf::from("/out/1abc_pdb_2"));
    }

    #[test]
    fn test_structure_name_is_stem() {
        assert_eq!(structure_name(Path::new("/a/b/1abc.pdb")), "1abc");
        assert_eq!(structure_name(Path::new("/a/b/model.v2.cif")), "model.v2");
    }

    #[test]
    fn test_request_from_config() {
        let batch = BatchSection {
            max_workers: Some(3),
            ..Default::default()
        };
        let request = BatchRequest::from_config("/data/in", &batch);
        assert_eq!(request.max_workers, 3);
        assert_eq!(request.output_root, PathBuf::from("results"));
        assert_eq!(request.report_path, PathBuf::from("batch_results.csv"));
    }
}
