use std::fs;
use std::net::SocketAddr;
use std::path::PathBuf;

use log::LevelFilter;
use tempfile::TempDir;

use txseq::config::{self, ConfigError, LogFormat, LogSettings, Settings, CONFIG_FILE_NAME};
use txseq::server_common::{Engine, Pool};

#[test]
fn missing_fields_take_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join(CONFIG_FILE_NAME);
    fs::write(
        &path,
        r#"{ "addr": "0.0.0.0:4100", "engine": "sled", "log": { "level": "debug", "format": "json" } }"#,
    )
    .unwrap();

    let settings = Settings::from_file(&path).unwrap();
    assert_eq!(settings.addr, "0.0.0.0:4100".parse::<SocketAddr>().unwrap());
    assert_eq!(settings.engine, Engine::Sled);
    assert_eq!(settings.pool, Pool::SharedQueue);
    assert_eq!(settings.shutdown_timeout_secs, 5);
    assert_eq!(settings.version, env!("CARGO_PKG_VERSION"));
    assert_eq!(settings.log.format, LogFormat::Json);
    assert_eq!(settings.log.file, None);
    assert_eq!(settings.log.level_filter().unwrap(), LevelFilter::Debug);
}

#[test]
fn first_search_path_wins() {
    let first = TempDir::new().unwrap();
    let second = TempDir::new().unwrap();
    fs::write(first.path().join(CONFIG_FILE_NAME), r#"{ "pool": "rayon" }"#).unwrap();
    fs::write(second.path().join(CONFIG_FILE_NAME), r#"{ "pool": "naive" }"#).unwrap();
    let empty = TempDir::new().unwrap();

    let paths: Vec<PathBuf> = vec![
        empty.path().to_owned(),
        first.path().to_owned(),
        second.path().to_owned(),
    ];
    let settings = Settings::discover(&paths).unwrap().unwrap();
    assert_eq!(settings.pool, Pool::Rayon);
}

#[test]
fn nothing_found_is_not_an_error() {
    let empty = TempDir::new().unwrap();
    assert!(Settings::discover(&[empty.path().to_owned()])
        .unwrap()
        .is_none());
}

#[test]
fn explicit_file_must_exist() {
    let empty = TempDir::new().unwrap();
    let path = empty.path().join("nope.json");
    match Settings::load(Some(path.as_path())) {
        Err(ConfigError::FailToRead { .. }) => (),
        other => panic!("unexpected result {:?}", other),
    }
}

#[test]
fn malformed_file_is_reported() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join(CONFIG_FILE_NAME);
    fs::write(&path, r#"{ "engine": "postgres" }"#).unwrap();
    match Settings::from_file(&path) {
        Err(ConfigError::Malformed { .. }) => (),
        other => panic!("unexpected result {:?}", other),
    }
}

#[test]
fn unknown_level_is_rejected() {
    let settings = LogSettings {
        level: "loud".to_owned(),
        ..LogSettings::default()
    };
    match config::log4rs::config(&settings) {
        Err(ConfigError::InvalidLevel { level }) => assert_eq!(level, "loud"),
        other => panic!("unexpected result {:?}", other.map(|_| ())),
    }
}

#[test]
fn logger_config_with_file_appender() {
    let temp_dir = TempDir::new().unwrap();
    let settings = LogSettings {
        level: "warn".to_owned(),
        file: Some(temp_dir.path().join("txseq.log")),
        format: LogFormat::Json,
    };
    let config = config::log4rs::config(&settings).unwrap();
    assert_eq!(config.root().level(), LevelFilter::Warn);
    assert_eq!(config.appenders().len(), 3);
    let app_error = config
        .loggers()
        .iter()
        .find(|logger| logger.name() == "app::error")
        .unwrap();
    assert_eq!(app_error.level(), LevelFilter::Warn);
}
