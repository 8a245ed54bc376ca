use log4rs::append::console::{ConsoleAppender, Target};
use log4rs::append::file::FileAppender;
use log4rs::config::{Appender, Config, Logger, Root};
use log4rs::encode::json::JsonEncoder;
use log4rs::encode::pattern::PatternEncoder;
use log4rs::encode::Encode;
use log4rs::Handle;
use log::LevelFilter;

use super::{ConfigError, LogFormat, LogSettings, Result};

const PATTERN: &str = concat!(
    "{T}=>txseq[",
    env!("CARGO_PKG_VERSION"),
    "]@{d(%Y-%m-%d %H:%M:%S)}=>{l} {t} txn={X(txn)(-)}: {m}{n}"
);

fn encoder(format: LogFormat) -> Box<dyn Encode> {
    match format {
        LogFormat::Pattern => Box::new(PatternEncoder::new(PATTERN)),
        LogFormat::Json => Box::new(JsonEncoder::new()),
    }
}

/// Build the logger configuration.
///
/// The root logs to stdout, `app::error` additionally goes to stderr,
/// and with `file` set everything is also appended to that file.
pub fn config(settings: &LogSettings) -> Result<Config> {
    let level = settings.level_filter()?;
    let stdout = ConsoleAppender::builder()
        .target(Target::Stdout)
        .encoder(Box::new(PatternEncoder::new(PATTERN)))
        .build();
    let stderr = ConsoleAppender::builder()
        .target(Target::Stderr)
        .encoder(Box::new(PatternEncoder::new(PATTERN)))
        .build();

    let mut builder = Config::builder()
        .appender(Appender::builder().build("stdout", Box::new(stdout)))
        .appender(Appender::builder().build("stderr", Box::new(stderr)))
        .logger(
            Logger::builder()
                .appender("stderr")
                .build("app::error", LevelFilter::Warn),
        );
    let mut root = Root::builder().appender("stdout");

    if let Some(path) = settings.file.as_ref() {
        let file = FileAppender::builder()
            .encoder(encoder(settings.format))
            .append(true)
            .build(path)
            .map_err(|e| ConfigError::Logger {
                reason: format!("cannot open log file {}: {}", path.display(), e),
            })?;
        builder = builder.appender(Appender::builder().build("file", Box::new(file)));
        root = root.appender("file");
    }

    builder
        .build(root.build(level))
        .map_err(|e| ConfigError::Logger {
            reason: format!("{}", e),
        })
}

/// Install the logger globally. Only the first call of a process can succeed.
pub fn init(settings: &LogSettings) -> Result<Handle> {
    log4rs::init_config(config(settings)?).map_err(|e| ConfigError::Logger {
        reason: format!("{}", e),
    })
}
