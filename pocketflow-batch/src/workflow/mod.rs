//! Per-structure workflow

pub mod factory;
pub mod pipeline;

pub use factory::{ExternalToolFactory, PipelineFactory};
pub use pipeline::{PipelineError, PipelineOutcome, PipelineSettings, StructurePipeline};
