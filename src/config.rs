use std::fmt;
use std::path;

use lazy_static::lazy_static;
use serde_derive::Deserialize;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub indent_width: usize, /* columns per block level when writing new declarations */
    pub reload_delay_ms: u64, /* quiet time after a keystroke before the text is re-interpreted */
    pub watch_interval_ms: u64,
    pub undo_depth: usize,

    pub project_dir: Option<path::PathBuf>,
    pub catalog: Option<path::PathBuf>, /* extra widget classes, merged over the built-in ones */

    pub log_level: String,

    #[serde(skip)]
    pub version: usize, /* incremented when config changes */
}

impl Default for Config {
    fn default() -> Config {
        Config {
            indent_width: 4,
            reload_delay_ms: 1000,
            watch_interval_ms: 500,
            undo_depth: 256,

            project_dir: None,
            catalog: None,

            log_level: "info".to_string(),

            version: 0,
        }
    }
}

#[derive(Debug)]
pub enum LoadError {
    IoError(std::io::Error),
    TomlError(toml::de::Error),
    XdgError(xdg::BaseDirectoriesError),
}

impl From<std::io::Error> for LoadError {
    fn from(e: std::io::Error) -> LoadError {
        LoadError::IoError(e)
    }
}

impl From<toml::de::Error> for LoadError {
    fn from(e: toml::de::Error) -> LoadError {
        LoadError::TomlError(e)
    }
}

impl From<xdg::BaseDirectoriesError> for LoadError {
    fn from(e: xdg::BaseDirectoriesError) -> LoadError {
        LoadError::XdgError(e)
    }
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::IoError(e) => write!(f, "I/O error: {}", e),
            LoadError::TomlError(e) => write!(f, "malformed configuration: {}", e),
            LoadError::XdgError(e) => write!(f, "couldn't find configuration directory: {}", e),
        }
    }
}

impl Config {
    pub fn from_toml(text: &str) -> Result<Config, LoadError> {
        Ok(toml::from_str(text)?)
    }

    pub fn from_file<P: AsRef<path::Path>>(path: P) -> Result<Config, LoadError> {
        Config::from_toml(&std::fs::read_to_string(path)?)
    }

    /// Reads `kvweave/config.toml` from the XDG configuration directories, or the defaults if
    /// there isn't one.
    pub fn from_xdg() -> Result<Config, LoadError> {
        let dirs = xdg::BaseDirectories::with_prefix("kvweave")?;
        match dirs.find_config_file("config.toml") {
            Some(path) => Config::from_file(path),
            None => Ok(Config::default()),
        }
    }

    pub fn reload_delay(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.reload_delay_ms)
    }

    pub fn watch_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.watch_interval_ms.max(1))
    }

    pub fn tracing_level(&self) -> tracing::Level {
        self.log_level.parse().unwrap_or(tracing::Level::INFO)
    }
}

lazy_static! {
    static ref INSTANCE: parking_lot::RwLock<Config> = parking_lot::RwLock::new(Config::default());
}

/// Process-wide configuration, for the binary's benefit. Library code takes a `Config` explicitly.
pub fn get() -> parking_lot::RwLockReadGuard<'static, Config> {
    INSTANCE.read()
}

pub fn set() -> parking_lot::RwLockWriteGuard<'static, Config> {
    INSTANCE.write()
}
