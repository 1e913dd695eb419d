//! Application configuration.
//!
//! Settings are layered with figment, later layers winning:
//!
//! 1. Built-in defaults
//! 2. `config.toml` in the platform config directory (or `--config`)
//! 3. Environment variables prefixed `DUPEKEEP_` (`__` separates nesting)
//! 4. Command-line overrides, applied by the binary
//!
//! The resulting [`Config`] is handed explicitly to the operations that
//! need it; nothing in the library reads settings from global state.

use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// File name of the binary backup.
pub const BACKUP_FILE_NAME: &str = "backup.scanresults";
/// File name of the exclusion ledger.
pub const LEDGER_FILE_NAME: &str = "excluded_groups.json";
/// File name of the scan database.
pub const DATABASE_FILE_NAME: &str = "scan_database.sqlite";

/// Whether to write a backup when the session ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SaveOnExit {
    /// Ask the user.
    #[default]
    Ask,
    /// Always save.
    Always,
    /// Never save.
    Never,
}

impl fmt::Display for SaveOnExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ask => write!(f, "ask"),
            Self::Always => write!(f, "always"),
            Self::Never => write!(f, "never"),
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory for the backup, ledger and database. Falls back to the
    /// platform data directory when unset or not an existing directory.
    pub storage_dir: Option<PathBuf>,
    /// Write a backup after every operation that changes the list.
    pub backup_after_change: bool,
    /// Backup policy when the session ends.
    pub save_on_exit: SaveOnExit,
    /// Delete permanently when the trash rejects a file.
    pub trash_fallback_to_permanent: bool,
    /// Suffix for files parked during a swap or symbolic link replacement.
    pub swap_temp_suffix: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage_dir: None,
            backup_after_change: true,
            save_on_exit: SaveOnExit::Ask,
            trash_fallback_to_permanent: true,
            swap_temp_suffix: ".dkswap".to_string(),
        }
    }
}

impl Config {
    /// Load the configuration from defaults, the default config file and
    /// the environment.
    ///
    /// Errors in any layer are logged and the defaults are used instead.
    #[must_use]
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Self::figment(None).extract().unwrap_or_else(|e| {
                log::warn!("Invalid configuration, using defaults: {}", e);
                Self::default()
            }),
        }
    }

    /// Load the configuration using `path` as the config file.
    ///
    /// A missing file is not an error.
    #[must_use]
    pub fn load_from(path: &Path) -> Self {
        match Self::try_load_from(path) {
            Ok(config) => config,
            Err(e) => {
                log::warn!(
                    "Failed to load config from {}, using defaults: {}",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Load the configuration using `path` as the config file, reporting
    /// malformed input.
    ///
    /// # Errors
    ///
    /// Returns the figment error for invalid TOML or mistyped values.
    pub fn try_load_from(path: &Path) -> Result<Self, figment::Error> {
        let config: Self = Self::figment(Some(path)).extract()?;
        log::debug!("Configuration loaded: {:?}", config);
        Ok(config)
    }

    fn figment(path: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = path {
            figment = figment.merge(Toml::file(path));
        }
        figment.merge(Env::prefixed("DUPEKEEP_").split("__"))
    }

    /// Default platform-specific configuration file path.
    #[must_use]
    pub fn config_path() -> Option<PathBuf> {
        project_dirs().map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Directory holding the backup, ledger and database.
    #[must_use]
    pub fn storage_dir(&self) -> PathBuf {
        if let Some(dir) = &self.storage_dir {
            if dir.is_dir() {
                return dir.clone();
            }
            log::warn!(
                "Storage directory {} does not exist, using the default location",
                dir.display()
            );
        }
        project_dirs()
            .map(|dirs| dirs.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Location of the binary backup.
    #[must_use]
    pub fn backup_path(&self) -> PathBuf {
        self.storage_dir().join(BACKUP_FILE_NAME)
    }

    /// Location of the exclusion ledger.
    #[must_use]
    pub fn ledger_path(&self) -> PathBuf {
        self.storage_dir().join(LEDGER_FILE_NAME)
    }

    /// Location of the scan database.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.storage_dir().join(DATABASE_FILE_NAME)
    }

    /// Render as TOML, e.g. to seed a config file.
    ///
    /// # Errors
    ///
    /// Returns the encoder error.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "dupekeep", "dupekeep")
}
