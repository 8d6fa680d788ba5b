//! Configuration resolution tests
//!
//! Tests that touch POGS_CONFIG are marked #[serial] so they do not race on
//! the process environment.

use pogs_common::config::{
    load_toml_config, locate_config_file, BootstrapConfig, ConfigOverrides, CONFIG_ENV_VAR,
};
use pogs_common::Error;
use serial_test::serial;
use std::env;
use std::path::PathBuf;

#[test]
#[serial]
fn test_explicit_config_file_is_loaded() {
    env::remove_var(CONFIG_ENV_VAR);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("assimilator.toml");
    std::fs::write(
        &path,
        r#"
        database_path = "/srv/pogs/pogs.db"
        upload_root = "/srv/boinc/upload"

        [logging]
        level = "warn"
        "#,
    )
    .unwrap();

    let resolved = BootstrapConfig::resolve(&ConfigOverrides::default(), Some(&path)).unwrap();

    assert_eq!(resolved.database_path, PathBuf::from("/srv/pogs/pogs.db"));
    assert_eq!(resolved.upload_root, PathBuf::from("/srv/boinc/upload"));
    assert_eq!(resolved.log_level, "warn");
    assert_eq!(resolved.max_concurrent_tasks, 4);
    assert_eq!(resolved.source, Some(path));
}

#[test]
#[serial]
fn test_missing_explicit_config_is_an_error() {
    let result = locate_config_file(Some(&PathBuf::from("/nonexistent/pogs/assimilator.toml")));
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
#[serial]
fn test_env_var_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("from-env.toml");
    std::fs::write(&path, "max_concurrent_tasks = 2\n").unwrap();

    env::set_var(CONFIG_ENV_VAR, &path);
    let located = locate_config_file(None).unwrap();
    env::remove_var(CONFIG_ENV_VAR);

    assert_eq!(located, Some(path));
}

#[test]
#[serial]
fn test_cli_overrides_beat_config_file() {
    env::remove_var(CONFIG_ENV_VAR);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("assimilator.toml");
    std::fs::write(&path, "database_path = \"/from/toml.db\"\nmax_concurrent_tasks = 16\n").unwrap();

    let overrides = ConfigOverrides {
        database_path: Some(PathBuf::from("/from/cli.db")),
        log_level: Some("debug".to_string()),
        ..Default::default()
    };
    let resolved = BootstrapConfig::resolve(&overrides, Some(&path)).unwrap();

    assert_eq!(resolved.database_path, PathBuf::from("/from/cli.db"));
    assert_eq!(resolved.max_concurrent_tasks, 16);
    assert_eq!(resolved.log_level, "debug");
}

#[test]
fn test_malformed_config_file_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.toml");
    std::fs::write(&path, "database_path = [not toml").unwrap();

    let result = load_toml_config(&path);
    assert!(matches!(result, Err(Error::Config(_))));
}
