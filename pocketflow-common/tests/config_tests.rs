//! Integration tests for configuration resolution and graceful degradation
//!
//! Tests that manipulate POCKETFLOW_CONFIG are marked with #[serial] so they
//! never race on the process environment.

use pocketflow_common::config::{
    load_or_default, load_toml_config, resolve_config_path, write_toml_config, TomlConfig,
    CONFIG_ENV_VAR,
};
use pocketflow_common::Error;
use serial_test::serial;
use std::env;
use std::path::PathBuf;
use tempfile::TempDir;

#[test]
#[serial]
fn test_cli_argument_wins_over_environment() {
    env::set_var(CONFIG_ENV_VAR, "/tmp/pocketflow-from-env.toml");

    let cli = PathBuf::from("/tmp/pocketflow-from-cli.toml");
    let resolved = resolve_config_path(Some(&cli));
    assert_eq!(resolved, Some(cli));

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_environment_variable_used_without_cli_argument() {
    env::set_var(CONFIG_ENV_VAR, "/tmp/pocketflow-from-env.toml");

    let resolved = resolve_config_path(None);
    assert_eq!(resolved, Some(PathBuf::from("/tmp/pocketflow-from-env.toml")));

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_missing_config_file_falls_back_to_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let missing = temp_dir.path().join("does-not-exist.toml");

    let config = load_or_default(Some(&missing)).unwrap();
    assert_eq!(config, TomlConfig::default());
}

#[test]
#[serial]
fn test_write_then_load_preserves_values() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("nested").join("pocketflow.toml");

    let mut config = TomlConfig::default();
    config.batch.top_k = 7;
    config.batch.max_workers = Some(2);
    config.batch.file_extensions = vec!["pdb".to_string()];
    config.dedup.center_distance_threshold = 4.0;
    config.tools.p2rank_home = Some(PathBuf::from("/opt/p2rank_2.5.1"));

    write_toml_config(&config, &path).unwrap();
    assert!(path.exists());

    let loaded = load_or_default(Some(&path)).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn test_malformed_config_is_an_error() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("broken.toml");
    std::fs::write(&path, "[batch\ntop_k = ").unwrap();

    match load_toml_config(&path) {
        Err(Error::TomlParse(_)) => {}
        other => panic!("Expected TomlParse error, got {:?}", other),
    }
}

#[test]
fn test_out_of_range_values_are_rejected_on_load() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("bad-range.toml");
    std::fs::write(&path, "[dedup]\nresidue_jaccard_threshold = 2.0\n").unwrap();

    match load_toml_config(&path) {
        Err(Error::Config(msg)) => assert!(msg.contains("residue_jaccard_threshold")),
        other => panic!("Expected Config error, got {:?}", other),
    }
}
