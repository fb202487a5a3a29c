use std::fs;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{filter, fmt, EnvFilter, Layer};

use crate::config::types::LoggingConfig;

/// Logging setup.
pub struct LogConfig {
    pub log_dir: String,
    pub general_log_retention_days: usize,
    pub error_log_retention_days: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_dir: "logs".to_string(),
            general_log_retention_days: 10,
            error_log_retention_days: 30,
        }
    }
}

impl From<&LoggingConfig> for LogConfig {
    fn from(config: &LoggingConfig) -> Self {
        Self {
            log_dir: config.log_dir.clone(),
            general_log_retention_days: config.general_log_retention_days,
            error_log_retention_days: config.error_log_retention_days,
        }
    }
}

/// Installs the global subscriber: daily `info` and `error` files plus the console.
///
/// The returned guards flush the non-blocking writers and must live for the
/// whole program.
pub fn init_logging(config: LogConfig) -> Result<Vec<WorkerGuard>, Box<dyn std::error::Error>> {
    fs::create_dir_all(&config.log_dir)?;

    let mut guards = Vec::new();

    // INFO and WARN, rotated daily
    let general_file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("info")
        .filename_suffix("log")
        .max_log_files(config.general_log_retention_days)
        .build(&config.log_dir)?;

    let (general_non_blocking, general_guard) =
        tracing_appender::non_blocking(general_file_appender);
    guards.push(general_guard);

    // ERROR only, kept longer
    let error_file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("error")
        .filename_suffix("log")
        .max_log_files(config.error_log_retention_days)
        .build(&config.log_dir)?;

    let (error_non_blocking, error_guard) = tracing_appender::non_blocking(error_file_appender);
    guards.push(error_guard);

    let (console_non_blocking, console_guard) = tracing_appender::non_blocking(std::io::stdout());
    guards.push(console_guard);

    let general_layer = fmt::layer()
        .with_writer(general_non_blocking)
        .with_ansi(false)
        .with_filter(filter::filter_fn(|meta| {
            *meta.level() <= Level::INFO && *meta.level() != Level::ERROR
        }));

    let error_layer = fmt::layer()
        .with_writer(error_non_blocking)
        .with_ansi(false)
        .with_filter(filter::filter_fn(|meta| *meta.level() == Level::ERROR));

    let console_layer = fmt::layer()
        .with_writer(console_non_blocking)
        .with_filter(EnvFilter::from_default_env());

    tracing_subscriber::registry()
        .with(general_layer)
        .with(error_layer)
        .with(console_layer)
        .try_init()?;

    Ok(guards)
}
