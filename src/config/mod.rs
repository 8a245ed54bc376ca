//! Settings of the server and the CLIs.
//!
//! Settings are plain JSON, every field has a default so a file only names what it changes:
//!
//! ```json
//! { "addr": "0.0.0.0:4000", "engine": "sled", "log": { "level": "debug", "format": "json" } }
//! ```

use std::fs::File;
use std::io::BufReader;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use failure::Fail;
use log::LevelFilter;
use serde::{Deserialize, Serialize};

use crate::server_common::{Engine, Pool};

/// logger configuration built on log4rs.
pub mod log4rs;

/// the file looked up in every search path.
pub const CONFIG_FILE_NAME: &str = "txseq.json";

/// The error type of configuration loading.
#[derive(Debug, Fail)]
pub enum ConfigError {
    #[fail(display = "Failed to read config file {}: {}", file_name, io_error)]
    FailToRead {
        file_name: String,
        #[cause]
        io_error: std::io::Error,
    },
    #[fail(display = "Malformed config file {}: {}", file_name, serde_error)]
    Malformed {
        file_name: String,
        #[cause]
        serde_error: serde_json::Error,
    },
    #[fail(display = "No such log level: {}", level)]
    InvalidLevel { level: String },
    #[fail(display = "Failed to set up the logger: {}", reason)]
    Logger { reason: String },
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// The format of the log file.
#[derive(Debug, Eq, PartialEq, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// one human readable line per record.
    Pattern,
    /// one JSON object per record.
    Json,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// `off`, `error`, `warn`, `info`, `debug` or `trace`.
    pub level: String,
    /// also log into this file when set.
    pub file: Option<PathBuf>,
    pub format: LogFormat,
}

impl Default for LogSettings {
    fn default() -> Self {
        LogSettings {
            level: "info".to_owned(),
            file: None,
            format: LogFormat::Pattern,
        }
    }
}

impl LogSettings {
    pub fn level_filter(&self) -> Result<LevelFilter> {
        LevelFilter::from_str(self.level.trim()).map_err(|_| ConfigError::InvalidLevel {
            level: self.level.clone(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub name: String,
    pub version: String,
    pub addr: SocketAddr,
    pub engine: Engine,
    pub data_dir: PathBuf,
    pub pool: Pool,
    pub threads: usize,
    /// how long in-flight requests may take to finish on shutdown.
    pub shutdown_timeout_secs: u64,
    pub log: LogSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            name: env!("CARGO_PKG_NAME").to_owned(),
            version: env!("CARGO_PKG_VERSION").to_owned(),
            addr: SocketAddr::from(([127, 0, 0, 1], 4000)),
            engine: Engine::default(),
            data_dir: PathBuf::from("."),
            pool: Pool::default(),
            threads: num_cpus::get(),
            shutdown_timeout_secs: 5,
            log: LogSettings::default(),
        }
    }
}

/// `/etc/txseq`, `$HOME/.txseq` and the current directory, in lookup order.
pub fn default_search_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("/etc/txseq")];
    if let Some(home) = std::env::var_os("HOME") {
        paths.push(PathBuf::from(home).join(".txseq"));
    }
    paths.push(PathBuf::from("."));
    paths
}

impl Settings {
    /// read settings from one JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let file_name = path.as_ref().display().to_string();
        let file = File::open(path.as_ref()).map_err(|io_error| ConfigError::FailToRead {
            file_name: file_name.clone(),
            io_error,
        })?;
        serde_json::from_reader(BufReader::new(file))
            .map_err(|serde_error| ConfigError::Malformed {
                file_name,
                serde_error,
            })
    }

    /// read the first `txseq.json` found in `paths`.
    /// Returns `None` when no path holds one.
    pub fn discover(paths: &[PathBuf]) -> Result<Option<Self>> {
        match paths
            .iter()
            .map(|dir| dir.join(CONFIG_FILE_NAME))
            .find(|candidate| candidate.is_file())
        {
            Some(found) => Settings::from_file(found).map(Some),
            None => Ok(None),
        }
    }

    /// load `explicit` if given; otherwise search the default paths,
    /// falling back to the defaults when no file exists.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Settings::from_file(path),
            None => Ok(Settings::discover(&default_search_paths())?.unwrap_or_default()),
        }
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}
