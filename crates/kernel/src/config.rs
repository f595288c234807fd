//! Configuration loaded from environment variables and `config.ini`.

use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use beacon_kernel::ini::IniFile;

const DEFAULT_CONFIG_DIR: &str = "/etc/beacon";
const DEFAULT_BASE_DIR: &str = "/usr/share/beacon";

/// Where log output goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    Stderr,
    File(PathBuf),
    None,
}

/// The `[logging]` section of `config.ini`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    pub target: LogTarget,

    /// Filter directive used when neither `RUST_LOG` nor a command line
    /// flag sets one.
    pub level: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            target: LogTarget::Stderr,
            level: None,
        }
    }
}

impl LoggingConfig {
    pub fn logs_to_file(&self) -> bool {
        matches!(self.target, LogTarget::File(_))
    }
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Configuration directory (default: /etc/beacon).
    pub config_dir: PathBuf,

    /// Installation directory holding the application's own schema
    /// upgrades (default: /usr/share/beacon).
    pub base_dir: PathBuf,

    /// Directories searched for installed modules, first match wins.
    pub module_paths: Vec<PathBuf>,

    /// PostgreSQL connection URL. Migrations are unavailable without one.
    pub database_url: Option<String>,

    /// Maximum database connections in pool (default: 5).
    pub database_max_connections: u32,

    pub logging: LoggingConfig,

    /// Problems found while reading `config.ini`.
    ///
    /// Collected instead of logged because logging is configured from the
    /// same file.
    pub warnings: Vec<String>,
}

impl Config {
    /// Load configuration from environment variables, then `config.ini`.
    ///
    /// `BEACON_MODULE_PATH` overrides `[global] module_path`.
    pub fn from_env() -> Result<Self> {
        let config_dir = env::var("BEACON_CONFIG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_DIR));

        let base_dir = env::var("BEACON_BASE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_BASE_DIR));

        let mut config = Self::load(&config_dir, &base_dir);

        if let Ok(paths) = env::var("BEACON_MODULE_PATH") {
            config.module_paths = split_paths(&paths);
        }

        config.database_url = env::var("DATABASE_URL").ok().filter(|url| !url.is_empty());

        config.database_max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "5".to_string())
            .parse()
            .context("DATABASE_MAX_CONNECTIONS must be a valid number")?;

        Ok(config)
    }

    /// Load `config.ini` from `config_dir`, degrading to defaults.
    pub fn load(config_dir: &Path, base_dir: &Path) -> Self {
        let mut warnings = Vec::new();
        let path = config_dir.join("config.ini");

        let ini = if path.exists() {
            match IniFile::read(&path) {
                Ok(ini) => ini,
                Err(e) => {
                    warnings.push(format!("{e:#}, using defaults"));
                    IniFile::new()
                }
            }
        } else {
            IniFile::new()
        };

        let module_paths = match ini.get("global", "module_path") {
            Some(paths) => split_paths(paths),
            None => vec![base_dir.join("modules")],
        };

        let logging = logging_config(&ini, &mut warnings);

        Self {
            config_dir: config_dir.to_path_buf(),
            base_dir: base_dir.to_path_buf(),
            module_paths,
            database_url: None,
            database_max_connections: 5,
            logging,
            warnings,
        }
    }
}

fn logging_config(ini: &IniFile, warnings: &mut Vec<String>) -> LoggingConfig {
    let level = ini
        .get("logging", "level")
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_ascii_lowercase);

    let target = match ini.get("logging", "log").map(str::trim) {
        None | Some("stderr") => LogTarget::Stderr,
        Some("none") => LogTarget::None,
        Some("file") => match ini.get("logging", "file").map(str::trim) {
            Some(file) if !file.is_empty() => LogTarget::File(PathBuf::from(file)),
            _ => {
                warnings.push("[logging] log = file requires a file setting".to_string());
                LogTarget::Stderr
            }
        },
        Some(other) => {
            warnings.push(format!("unknown log target {other:?}, logging to stderr"));
            LogTarget::Stderr
        }
    };

    LoggingConfig { target, level }
}

fn split_paths(paths: &str) -> Vec<PathBuf> {
    paths
        .split(':')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(PathBuf::from)
        .collect()
}
