//! pocketflow - binding-site post-processing and batch runner
//!
//! Subcommands:
//! - `run`: process one structure and print its ranking and cliff report
//! - `batch`: process every structure under a directory in parallel
//! - `version`: print the version
//!
//! Exit codes: 0 when everything succeeded, 1 when at least one structure
//! failed, 2 on a fatal error (no report written).

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use pocketflow_batch::batch::{report, structure_name, BatchCoordinator, BatchProgress, BatchRequest};
use pocketflow_batch::models::BatchItemResult;
use pocketflow_batch::workflow::{ExternalToolFactory, PipelineFactory};
use pocketflow_common::config::{load_or_default, parse_extensions, TomlConfig};
use pocketflow_common::events::{BatchEvent, EventBus};
use pocketflow_common::human_time::format_seconds;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Command-line arguments for pocketflow
#[derive(Parser, Debug)]
#[command(name = "pocketflow")]
#[command(about = "Binding-site deduplication, rescoring and confidence stratification")]
#[command(version)]
struct Cli {
    /// Config file (overrides POCKETFLOW_CONFIG)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Process a single structure file
    Run(RunArgs),
    /// Process every structure file under a directory
    Batch(BatchArgs),
    /// Print version information
    Version,
}

/// Options shared by `run` and `batch`
#[derive(Args, Debug)]
struct PipelineArgs {
    /// Rescored candidates kept per structure
    #[arg(long)]
    top_k: Option<usize>,

    /// P2Rank installation directory
    #[arg(long)]
    p2rank_home: Option<PathBuf>,

    /// Disable cliff analysis
    #[arg(long)]
    no_cliff: bool,

    /// Per-stage timeout for external tools (seconds)
    #[arg(long)]
    timeout_secs: Option<u64>,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Structure file (.pdb or .cif)
    structure: PathBuf,

    /// Working directory for tool output
    #[arg(long, default_value = "runs")]
    workdir: PathBuf,

    #[command(flatten)]
    pipeline: PipelineArgs,
}

#[derive(Args, Debug)]
struct BatchArgs {
    /// Directory scanned recursively for structure files
    input_dir: PathBuf,

    /// Root of the per-structure output tree
    #[arg(long)]
    results_dir: Option<PathBuf>,

    /// Aggregate CSV report path
    #[arg(long)]
    output_csv: Option<PathBuf>,

    /// Comma-separated extensions, e.g. "pdb,cif"
    #[arg(long)]
    file_extensions: Option<String>,

    /// Worker pool size
    #[arg(long)]
    max_workers: Option<usize>,

    #[command(flatten)]
    pipeline: PipelineArgs,
}

impl PipelineArgs {
    fn apply(&self, config: &mut TomlConfig) {
        if let Some(top_k) = self.top_k {
            config.batch.top_k = top_k;
        }
        if let Some(home) = &self.p2rank_home {
            config.tools.p2rank_home = Some(home.clone());
        }
        if self.no_cliff {
            config.batch.enable_confidence_stratification = false;
        }
        if let Some(secs) = self.timeout_secs {
            config.batch.item_timeout_secs = Some(secs);
        }
    }
}

impl BatchArgs {
    fn apply(&self, config: &mut TomlConfig) {
        self.pipeline.apply(config);
        if let Some(dir) = &self.results_dir {
            config.batch.output_root = dir.clone();
        }
        if let Some(csv) = &self.output_csv {
            config.batch.output_report_path = csv.clone();
        }
        if let Some(list) = &self.file_extensions {
            config.batch.file_extensions = parse_extensions(list);
        }
        if let Some(workers) = self.max_workers {
            config.batch.max_workers = Some(workers);
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match dispatch(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::from(2)
        }
    }
}

async fn dispatch(cli: Cli) -> Result<ExitCode> {
    if let Command::Version = cli.command {
        println!("pocketflow {}", env!("CARGO_PKG_VERSION"));
        return Ok(ExitCode::SUCCESS);
    }

    let mut config = load_or_default(cli.config.as_deref()).context("Failed to load configuration")?;
    init_tracing(&config.logging.level);

    match cli.command {
        Command::Run(args) => {
            args.pipeline.apply(&mut config);
            config.validate().context("Invalid configuration")?;
            run_single(&args, &config).await
        }
        Command::Batch(args) => {
            args.apply(&mut config);
            config.validate().context("Invalid configuration")?;
            run_batch(&args.input_dir, &config).await
        }
        Command::Version => Ok(ExitCode::SUCCESS),
    }
}

/// `RUST_LOG` wins over the configured level
fn init_tracing(level: &str) {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn run_single(args: &RunArgs, config: &TomlConfig) -> Result<ExitCode> {
    let pipeline = ExternalToolFactory::from_config(config)
        .create()
        .context("Rescoring tool unavailable")?;

    let name = structure_name(&args.structure);
    let workdir = args.workdir.join(&name);
    info!(structure = %args.structure.display(), workdir = %workdir.display(), "Processing structure");

    let start = std::time::Instant::now();
    let outcome = match pipeline.run(&name, &args.structure, &workdir).await {
        Ok(outcome) => outcome,
        Err(e) => {
            error!(structure = %name, error = %e, "Structure failed");
            eprintln!("{} failed: {}", name, e);
            return Ok(ExitCode::from(1));
        }
    };

    if let Some(cliff) = &outcome.cliff {
        println!("{}", cliff.format_report());
        println!();
    }

    let result = outcome.into_item_result(name.clone(), &args.structure, start.elapsed());
    print_top_k(&result);

    let path = report::write_detailed(&result, &workdir).context("Failed to write detailed report")?;
    println!("Detailed report: {}", path.display());
    Ok(ExitCode::SUCCESS)
}

fn print_top_k(result: &BatchItemResult) {
    println!(
        "{} : {} detected, {} after clustering, {}",
        result.name,
        result.detected_count,
        result.filtered_count,
        format_seconds(result.processing_time.as_secs_f64())
    );
    println!(
        "{:>4}  {:>10}  {:>10}  {:>26}  {:>6}  {}",
        "rank", "score", "raw_score", "center", "change", "high"
    );
    for ranked in &result.top_k {
        let c = ranked.scored.center();
        println!(
            "{:>4}  {:>10.4}  {:>10.4}  {:>26}  {:>6}  {}",
            ranked.rank,
            ranked.scored.score,
            ranked.scored.raw_score(),
            format!("({:.3}, {:.3}, {:.3})", c.x, c.y, c.z),
            ranked.rank_change_display(),
            if ranked.is_high_confidence { "*" } else { "" }
        );
    }
}

async fn run_batch(input_dir: &Path, config: &TomlConfig) -> Result<ExitCode> {
    let request = BatchRequest::from_config(input_dir, &config.batch);
    info!(
        input = %request.input_root.display(),
        output = %request.output_root.display(),
        workers = request.max_workers,
        "Starting batch"
    );

    let event_bus = EventBus::default();
    let logger = tokio::spawn(log_events(event_bus.subscribe()));

    let coordinator = BatchCoordinator::new(
        Arc::new(ExternalToolFactory::from_config(config)),
        event_bus,
    );
    let outcome = coordinator.run(&request).await;
    drop(coordinator);
    if let Err(e) = logger.await {
        warn!(error = %e, "Event logger ended abnormally");
    }

    let outcome = outcome.context("Batch aborted")?;

    println!("=== Batch summary ===");
    for line in outcome.summary.display_lines() {
        println!("{}", line);
    }
    println!("Report: {}", outcome.report_path.display());

    Ok(if outcome.has_failures() {
        ExitCode::from(1)
    } else {
        ExitCode::SUCCESS
    })
}

/// Log batch events until the bus closes
async fn log_events(mut rx: tokio::sync::broadcast::Receiver<BatchEvent>) {
    let mut progress = BatchProgress::default();
    loop {
        match rx.recv().await {
            Ok(BatchEvent::BatchStarted { total_items, max_workers, .. }) => {
                progress = BatchProgress::new(total_items);
                info!(total_items, max_workers, "Batch started");
            }
            Ok(BatchEvent::ItemStarted { name, .. }) => {
                progress.record_started();
                info!(structure = %name, progress = %progress.display_string(), "Started");
            }
            Ok(BatchEvent::ItemCompleted { name, status, error, elapsed_seconds, .. }) => {
                progress.record_completed(error.is_some());
                if error.is_some() {
                    warn!(
                        structure = %name,
                        error = error.as_deref().unwrap_or(""),
                        progress = %progress.display_string(),
                        "Failed"
                    );
                } else {
                    info!(
                        structure = %name,
                        %status,
                        elapsed = %format_seconds(elapsed_seconds),
                        progress = %progress.display_string(),
                        "Completed"
                    );
                }
            }
            Ok(BatchEvent::BatchCompleted { succeeded, failed, elapsed_seconds, .. }) => {
                info!(succeeded, failed, elapsed = %format_seconds(elapsed_seconds), "Batch finished");
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "Event logger lagged");
            }
            Err(RecvError::Closed) => break,
        }
    }
}
