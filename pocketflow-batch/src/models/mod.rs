//! Data models for pocketflow-batch
//!
//! - Candidate sites as produced by detection and rescoring
//! - Per-structure batch results

pub mod batch_result;
pub mod candidate;

pub use batch_result::{BatchItemResult, CliffSummary, ItemStatus, RankedCandidate};
pub use candidate::{Candidate, Center, ScoredCandidate};
