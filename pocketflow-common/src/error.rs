//! Common error types for pocketflow

use thiserror::Error;

/// Common result type for pocketflow operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared across pocketflow crates
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// TOML file could not be parsed
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
}
