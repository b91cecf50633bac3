// Installer settings
// Layered: built-in defaults, then an optional TOML file, then TANK_INSTALLER_* variables.

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use log::LevelFilter;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::database::connection::DatabaseEngine;
use crate::security::password::DEFAULT_ITERATIONS;

/// File picked up from the working directory when no `--config` is given.
pub const DEFAULT_CONFIG_FILE: &str = "tank-installer.toml";
pub const ENV_PREFIX: &str = "TANK_INSTALLER";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallerSettings {
    pub log_level: String,
    pub log_to_stdout: bool,
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
    pub default_engine: DatabaseEngine,
    pub connect_timeout_secs: u64,
    pub password_hash_iterations: u32,
}

impl Default for InstallerSettings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_to_stdout: true,
            log_dir: None,
            default_engine: DatabaseEngine::MySql,
            connect_timeout_secs: 20,
            password_hash_iterations: DEFAULT_ITERATIONS,
        }
    }
}

impl InstallerSettings {
    /// Load settings. An explicit `config_path` must exist; the default file is optional.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let defaults = Self::default();
        let (file, required) = match config_path {
            Some(path) => (path.to_string_lossy().into_owned(), true),
            None => (DEFAULT_CONFIG_FILE.to_string(), false),
        };

        let settings = Config::builder()
            .set_default("log_level", defaults.log_level)?
            .set_default("log_to_stdout", defaults.log_to_stdout)?
            .set_default("default_engine", defaults.default_engine.as_str())?
            .set_default("connect_timeout_secs", defaults.connect_timeout_secs as i64)?
            .set_default(
                "password_hash_iterations",
                i64::from(defaults.password_hash_iterations),
            )?
            .add_source(File::new(&file, FileFormat::Toml).required(required))
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()
            .with_context(|| format!("Failed to load installer settings from {}", file))?;

        settings
            .try_deserialize()
            .context("Invalid installer settings")
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Unknown level names fall back to `info`.
    pub fn level_filter(&self) -> LevelFilter {
        LevelFilter::from_str(self.log_level.trim()).unwrap_or(LevelFilter::Info)
    }
}
