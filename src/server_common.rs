use std::str::FromStr;

use failure::Fail;
use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::engines::errors::StoreError;
use crate::server_common::ServerError::{EngineError, UnsupportedContract};

/// The backing store of a working directory.
#[derive(Debug, Eq, PartialEq, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    Memory,
    Log,
    Sled,
}

impl Default for Engine {
    fn default() -> Self {
        Engine::Log
    }
}

#[derive(Debug, Eq, PartialEq, Clone, Fail)]
#[fail(display = "No such engine: {}", _0)]
pub struct NoSuchEngine(String);

impl FromStr for Engine {
    type Err = NoSuchEngine;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" => Ok(Engine::Memory),
            "log" => Ok(Engine::Log),
            "sled" => Ok(Engine::Sled),
            _ => Err(NoSuchEngine(s.to_owned())),
        }
    }
}

impl AsRef<str> for Engine {
    fn as_ref(&self) -> &str {
        match self {
            Engine::Memory => "memory",
            Engine::Log => "log",
            Engine::Sled => "sled",
        }
    }
}

/// The thread pool serving connections.
#[derive(Debug, Eq, PartialEq, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pool {
    Naive,
    Rayon,
    SharedQueue,
}

impl Default for Pool {
    fn default() -> Self {
        Pool::SharedQueue
    }
}

#[derive(Debug, Eq, PartialEq, Clone, Fail)]
#[fail(display = "No such pool: {}", _0)]
pub struct NoSuchPool(String);

impl FromStr for Pool {
    type Err = NoSuchPool;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "naive" => Ok(Pool::Naive),
            "shared_queue" => Ok(Pool::SharedQueue),
            "rayon" => Ok(Pool::Rayon),
            _ => Err(NoSuchPool(s.to_owned())),
        }
    }
}

impl AsRef<str> for Pool {
    fn as_ref(&self) -> &str {
        match self {
            Pool::Naive => "naive",
            Pool::Rayon => "rayon",
            Pool::SharedQueue => "shared_queue",
        }
    }
}

/// Open the store chosen by `$engine` in directory `$dir` as `$store`, then evaluate `$body`.
///
/// The stores don't share a type, so every arm expands `$body` once.
/// Errors of opening are raised with `?`, the enclosing function must accept `StoreError`.
#[macro_export]
macro_rules! with_store {
    ($engine: expr, $dir: expr, |$store: ident| $body: expr) => {
        match $engine {
            $crate::server_common::Engine::Memory => {
                let $store = $crate::engines::memory::MemoryStore::new();
                $body
            }
            $crate::server_common::Engine::Log => {
                let $store = $crate::engines::kvs::LogStore::open($dir)?;
                $body
            }
            $crate::server_common::Engine::Sled => {
                let $store = $crate::engines::sled::SledStore::open($dir)?;
                $body
            }
        }
    };
}

#[derive(Debug, Fail)]
pub enum ServerError {
    #[fail(display = "Engine exception: {}", eng_error)]
    EngineError {
        #[cause]
        eng_error: StoreError,
    },
    #[fail(display = "Unsupported contract: {}", contract_error)]
    UnsupportedContract {
        #[cause]
        contract_error: crate::contract::Error,
    },
    #[fail(display = "Network exception: {}", io_error)]
    Network {
        #[cause]
        io_error: std::io::Error,
    },
    #[fail(display = "Configuration exception: {}", config_error)]
    Config {
        #[cause]
        config_error: ConfigError,
    },
    #[fail(display = "Failed to build the thread pool: {}", reason)]
    PoolBuild { reason: String },
    #[fail(display = "{} request(s) still running after the shutdown timeout", _0)]
    ShutdownTimeout(usize),
}

pub type Result<T> = std::result::Result<T, ServerError>;

impl From<StoreError> for ServerError {
    fn from(err: StoreError) -> Self {
        EngineError { eng_error: err }
    }
}

impl From<crate::contract::Error> for ServerError {
    fn from(contract_error: crate::contract::Error) -> Self {
        UnsupportedContract { contract_error }
    }
}

impl From<std::io::Error> for ServerError {
    fn from(io_error: std::io::Error) -> Self {
        ServerError::Network { io_error }
    }
}

impl From<ConfigError> for ServerError {
    fn from(config_error: ConfigError) -> Self {
        ServerError::Config { config_error }
    }
}

impl From<rayon::ThreadPoolBuildError> for ServerError {
    fn from(error: rayon::ThreadPoolBuildError) -> Self {
        ServerError::PoolBuild {
            reason: format!("{}", error),
        }
    }
}
