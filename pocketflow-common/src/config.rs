//! Configuration loading and resolution
//!
//! Settings are resolved in priority order:
//! 1. Command-line arguments (applied by the binary on top of the loaded config)
//! 2. Environment variables (`POCKETFLOW_CONFIG` selects the file)
//! 3. TOML config file
//! 4. Compiled defaults
//!
//! A missing config file is not an error: a warning is logged and compiled
//! defaults are used. A config file that exists but cannot be parsed is an error.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "POCKETFLOW_CONFIG";

/// Config file name looked up in the working directory
pub const CONFIG_FILE_NAME: &str = "pocketflow.toml";

/// Upper bound for the default worker count
pub const MAX_DEFAULT_WORKERS: usize = 8;

/// Top-level TOML configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    /// Batch run settings
    pub batch: BatchSection,
    /// Overlap clustering thresholds
    pub dedup: DedupSection,
    /// External tool locations
    pub tools: ToolsSection,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// `[batch]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchSection {
    /// Root of the mirrored per-structure output tree
    pub output_root: PathBuf,
    /// Number of rescored candidates kept per structure
    pub top_k: usize,
    /// Aggregate CSV report path
    pub output_report_path: PathBuf,
    /// Recognized structure file extensions (without leading dot)
    pub file_extensions: Vec<String>,
    /// Worker pool size; `None` means `min(available parallelism, 8)`
    pub max_workers: Option<usize>,
    /// Run cliff analysis on each rescored list
    pub enable_confidence_stratification: bool,
    /// Per-stage timeout for external tool calls (seconds)
    pub item_timeout_secs: Option<u64>,
}

impl Default for BatchSection {
    fn default() -> Self {
        Self {
            output_root: PathBuf::from("results"),
            top_k: 5,
            output_report_path: PathBuf::from("batch_results.csv"),
            file_extensions: vec!["pdb".to_string(), "cif".to_string()],
            max_workers: None,
            enable_confidence_stratification: true,
            item_timeout_secs: None,
        }
    }
}

impl BatchSection {
    /// Worker count actually used by the batch coordinator
    pub fn effective_max_workers(&self) -> usize {
        self.max_workers
            .filter(|n| *n > 0)
            .unwrap_or_else(default_max_workers)
    }
}

/// `[dedup]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupSection {
    /// Centers closer than this (length units) are the same site
    pub center_distance_threshold: f64,
    /// Residue-set Jaccard similarity at or above this is the same site
    pub residue_jaccard_threshold: f64,
}

impl Default for DedupSection {
    fn default() -> Self {
        Self {
            center_distance_threshold: 5.0,
            residue_jaccard_threshold: 0.75,
        }
    }
}

/// `[tools]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsSection {
    /// P2Rank installation directory (overrides `P2RANK_HOME`)
    pub p2rank_home: Option<PathBuf>,
    /// fpocket executable (name on PATH or absolute path)
    pub fpocket_binary: PathBuf,
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            p2rank_home: None,
            fpocket_binary: PathBuf::from("fpocket"),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl TomlConfig {
    /// Check value ranges that serde cannot express
    pub fn validate(&self) -> Result<()> {
        if self.batch.top_k == 0 {
            return Err(Error::Config("batch.top_k must be at least 1".to_string()));
        }
        if self.batch.file_extensions.is_empty() {
            return Err(Error::Config(
                "batch.file_extensions must name at least one extension".to_string(),
            ));
        }
        let distance = self.dedup.center_distance_threshold;
        if !distance.is_finite() || distance < 0.0 {
            return Err(Error::Config(format!(
                "dedup.center_distance_threshold must be a non-negative number, got {}",
                distance
            )));
        }
        let jaccard = self.dedup.residue_jaccard_threshold;
        if !(0.0..=1.0).contains(&jaccard) {
            return Err(Error::Config(format!(
                "dedup.residue_jaccard_threshold must be within 0.0-1.0, got {}",
                jaccard
            )));
        }
        Ok(())
    }
}

/// Default worker count: `min(available parallelism, 8)`, never zero
pub fn default_max_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .clamp(1, MAX_DEFAULT_WORKERS)
}

/// Parse a comma-separated extension list (`"pdb, .CIF"` → `["pdb", "cif"]`)
pub fn parse_extensions(list: &str) -> Vec<String> {
    list.split(',')
        .map(|ext| ext.trim().trim_start_matches('.').to_lowercase())
        .filter(|ext| !ext.is_empty())
        .collect()
}

/// Locate the config file to load, if any
///
/// Priority: CLI argument → `POCKETFLOW_CONFIG` → `./pocketflow.toml` →
/// `<user config dir>/pocketflow/config.toml`. The first two are returned
/// even when the file does not exist so the caller can warn about it.
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.is_file() {
        return Some(local);
    }

    dirs::config_dir()
        .map(|d| d.join("pocketflow").join("config.toml"))
        .filter(|p| p.is_file())
}

/// Load and validate a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: TomlConfig = toml::from_str(&content)?;
    config.validate()?;
    debug!(path = %path.display(), "Loaded config file");
    Ok(config)
}

/// Resolve and load configuration, falling back to compiled defaults
pub fn load_or_default(cli_arg: Option<&Path>) -> Result<TomlConfig> {
    match resolve_config_path(cli_arg) {
        Some(path) if path.is_file() => {
            info!(path = %path.display(), "Using config file");
            load_toml_config(&path)
        }
        Some(path) => {
            warn!(
                path = %path.display(),
                "Config file not found, using compiled defaults"
            );
            Ok(TomlConfig::default())
        }
        None => {
            debug!("No config file located, using compiled defaults");
            Ok(TomlConfig::default())
        }
    }
}

/// Write a config to disk as TOML, creating parent directories
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    std::fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let config = TomlConfig::default();
        assert_eq!(config.batch.output_root, PathBuf::from("results"));
        assert_eq!(config.batch.top_k, 5);
        assert_eq!(config.batch.output_report_path, PathBuf::from("batch_results.csv"));
        assert_eq!(config.batch.file_extensions, vec!["pdb", "cif"]);
        assert!(config.batch.enable_confidence_stratification);
        assert_eq!(config.dedup.center_distance_threshold, 5.0);
        assert_eq!(config.dedup.residue_jaccard_threshold, 0.75);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_default_max_workers_bounds() {
        let workers = default_max_workers();
        assert!(workers >= 1);
        assert!(workers <= MAX_DEFAULT_WORKERS);
    }

    #[test]
    fn test_effective_max_workers_ignores_zero() {
        let batch = BatchSection {
            max_workers: Some(0),
            ..Default::default()
        };
        assert_eq!(batch.effective_max_workers(), default_max_workers());

        let batch = BatchSection {
            max_workers: Some(3),
            ..Default::default()
        };
        assert_eq!(batch.effective_max_workers(), 3);
    }

    #[test]
    fn test_parse_extensions_normalizes() {
        assert_eq!(parse_extensions("pdb,cif"), vec!["pdb", "cif"]);
        assert_eq!(parse_extensions(" .PDB , cif ,, "), vec!["pdb", "cif"]);
        assert!(parse_extensions("").is_empty());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: TomlConfig = toml::from_str("[batch]\ntop_k = 3\n").unwrap();
        assert_eq!(config.batch.top_k, 3);
        assert_eq!(config.batch.file_extensions, vec!["pdb", "cif"]);
        assert_eq!(config.dedup, DedupSection::default());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = TomlConfig::default();
        config.batch.top_k = 0;
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let mut config = TomlConfig::default();
        config.dedup.residue_jaccard_threshold = 1.5;
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let mut config = TomlConfig::default();
        config.dedup.center_distance_threshold = -1.0;
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        assert!(TomlConfig::default().validate().is_ok());
    }
}
