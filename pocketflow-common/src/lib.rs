//! # Pocketflow Common Library
//!
//! Shared code for the pocketflow crates including:
//! - Error types
//! - Configuration loading (TOML + environment)
//! - Batch event types and the EventBus
//! - Human-readable time formatting

pub mod config;
pub mod error;
pub mod events;
pub mod human_time;

pub use error::{Error, Result};
