//! Bootstrap configuration loading
//!
//! Resolution priority for every setting:
//! 1. Command-line argument / environment variable (highest priority)
//! 2. TOML config file
//! 3. OS-dependent compiled default (fallback)
//!
//! A missing config file is not an error: a warning is logged and compiled
//! defaults apply. A config file that exists but does not parse is.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "POGS_CONFIG";

/// Config file name searched for under the user and system config folders
pub const CONFIG_FILE_NAME: &str = "assimilator.toml";

/// Bootstrap configuration as written in the TOML file
///
/// Every field is optional; absent fields fall back to [`CompiledDefaults`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Path to the SQLite database holding assimilated results
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// Folder that relative output file names are resolved against
    #[serde(default)]
    pub upload_root: Option<PathBuf>,

    /// Upper bound on tasks assimilated concurrently in one batch
    #[serde(default)]
    pub max_concurrent_tasks: Option<usize>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// OS-dependent fallback values
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub database_path: PathBuf,
    pub upload_root: PathBuf,
    pub max_concurrent_tasks: usize,
    pub log_level: String,
}

impl CompiledDefaults {
    pub fn for_current_platform() -> Self {
        let data_dir = dirs::data_local_dir()
            .map(|d| d.join("pogs"))
            .unwrap_or_else(|| PathBuf::from("./pogs_data"));

        Self {
            database_path: data_dir.join("pogs.db"),
            upload_root: PathBuf::from("."),
            max_concurrent_tasks: 4,
            log_level: default_log_level(),
        }
    }
}

/// Values supplied on the command line (clap fills these, including env fallbacks)
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub database_path: Option<PathBuf>,
    pub upload_root: Option<PathBuf>,
    pub max_concurrent_tasks: Option<usize>,
    pub log_level: Option<String>,
}

/// Fully resolved bootstrap configuration
#[derive(Debug, Clone, PartialEq)]
pub struct BootstrapConfig {
    pub database_path: PathBuf,
    pub upload_root: PathBuf,
    pub max_concurrent_tasks: usize,
    pub log_level: String,
    /// Config file the settings were read from, if any
    pub source: Option<PathBuf>,
}

impl BootstrapConfig {
    /// Resolve configuration from overrides, the config file and compiled defaults
    ///
    /// `explicit_file` is the `--config` argument. When given it must exist;
    /// otherwise the standard locations are searched and may all be absent.
    ///
    /// Runs before logging is installed; callers report [`Self::source`].
    pub fn resolve(overrides: &ConfigOverrides, explicit_file: Option<&Path>) -> Result<Self> {
        let source = locate_config_file(explicit_file)?;
        let toml_config = match &source {
            Some(path) => load_toml_config(path)?,
            None => TomlConfig::default(),
        };

        let mut config =
            Self::merge(overrides, toml_config, CompiledDefaults::for_current_platform());
        config.source = source;
        Ok(config)
    }

    /// Log where the configuration came from
    pub fn log_source(&self) {
        match &self.source {
            Some(path) => info!("Loaded configuration from {}", path.display()),
            None => warn!("No config file found, using compiled defaults"),
        }
    }

    /// Apply the priority order to already-loaded sources
    pub fn merge(
        overrides: &ConfigOverrides,
        toml_config: TomlConfig,
        defaults: CompiledDefaults,
    ) -> Self {
        let max_concurrent_tasks = overrides
            .max_concurrent_tasks
            .or(toml_config.max_concurrent_tasks)
            .unwrap_or(defaults.max_concurrent_tasks)
            .max(1);

        Self {
            database_path: overrides
                .database_path
                .clone()
                .or(toml_config.database_path)
                .unwrap_or(defaults.database_path),
            upload_root: overrides
                .upload_root
                .clone()
                .or(toml_config.upload_root)
                .unwrap_or(defaults.upload_root),
            max_concurrent_tasks,
            log_level: overrides
                .log_level
                .clone()
                .unwrap_or(toml_config.logging.level),
            source: None,
        }
    }
}

/// Find the config file to load, if any
///
/// Order: explicit path, `POGS_CONFIG`, `~/.config/pogs/assimilator.toml`,
/// `/etc/pogs/assimilator.toml`.
pub fn locate_config_file(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
    if let Some(path) = explicit {
        if path.exists() {
            return Ok(Some(path.to_path_buf()));
        }
        return Err(Error::Config(format!(
            "Config file not found: {}",
            path.display()
        )));
    }

    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        let path = PathBuf::from(path);
        if path.exists() {
            return Ok(Some(path));
        }
        warn!(
            "{} points at missing file {}, ignoring",
            CONFIG_ENV_VAR,
            path.display()
        );
    }

    let user_config = dirs::config_dir().map(|d| d.join("pogs").join(CONFIG_FILE_NAME));
    if let Some(path) = user_config {
        if path.exists() {
            return Ok(Some(path));
        }
    }

    let system_config = PathBuf::from("/etc/pogs").join(CONFIG_FILE_NAME);
    if cfg!(unix) && system_config.exists() {
        return Ok(Some(system_config));
    }

    Ok(None)
}

/// Parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logging_defaults_to_info() {
        let config: TomlConfig = toml::from_str("").unwrap();
        assert_eq!(config.logging.level, "info");
        assert!(config.database_path.is_none());
    }

    #[test]
    fn test_merge_prefers_overrides_then_toml() {
        let overrides = ConfigOverrides {
            database_path: Some(PathBuf::from("/cli/pogs.db")),
            ..Default::default()
        };
        let toml_config: TomlConfig = toml::from_str(
            r#"
            database_path = "/toml/pogs.db"
            upload_root = "/toml/upload"
            max_concurrent_tasks = 8

            [logging]
            level = "debug"
            "#,
        )
        .unwrap();

        let resolved =
            BootstrapConfig::merge(&overrides, toml_config, CompiledDefaults::for_current_platform());

        assert_eq!(resolved.database_path, PathBuf::from("/cli/pogs.db"));
        assert_eq!(resolved.upload_root, PathBuf::from("/toml/upload"));
        assert_eq!(resolved.max_concurrent_tasks, 8);
        assert_eq!(resolved.log_level, "debug");
    }

    #[test]
    fn test_zero_concurrency_clamped_to_one() {
        let overrides = ConfigOverrides {
            max_concurrent_tasks: Some(0),
            ..Default::default()
        };
        let resolved = BootstrapConfig::merge(
            &overrides,
            TomlConfig::default(),
            CompiledDefaults::for_current_platform(),
        );
        assert_eq!(resolved.max_concurrent_tasks, 1);
    }
}
