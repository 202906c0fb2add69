//! pocketflow-batch library interface
//!
//! Post-processing and batch orchestration for binding-site predictions:
//! overlap clustering, cliff-based confidence stratification, the
//! per-structure pipeline, and the parallel batch coordinator.

pub mod batch;
pub mod error;
pub mod models;
pub mod services;
pub mod types;
pub mod workflow;

pub use crate::error::BatchError;
