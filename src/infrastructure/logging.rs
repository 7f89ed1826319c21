use std::fs;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::domain::config::LoggingConfig;
use crate::domain::DomainError;

const LOG_FILE_PREFIX: &str = "medini-voice.log";

/// Install the global subscriber: console output always, plus a daily
/// rotated JSON file under `logs_dir` when file logging is enabled.
///
/// The returned guard flushes the file writer when dropped and must be kept
/// alive for as long as the engine runs. Calling this again after a
/// subscriber is installed leaves the existing one in place.
pub fn init_logging(
    logs_dir: &Path,
    config: &LoggingConfig,
) -> Result<Option<WorkerGuard>, DomainError> {
    // RUST_LOG wins over the configured level
    let console_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("medini_voice={},warn", config.level)));

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(FmtSpan::NONE)
        .with_filter(console_filter);

    let (file_layer, guard) = if config.file_logging {
        fs::create_dir_all(logs_dir)?;
        let appender = RollingFileAppender::builder()
            .rotation(Rotation::DAILY)
            .filename_prefix(LOG_FILE_PREFIX)
            .max_log_files(config.max_files.max(1) as usize)
            .build(logs_dir)
            .map_err(|e| DomainError::Io(format!("Failed to create log file appender: {}", e)))?;
        let (writer, guard) = tracing_appender::non_blocking(appender);

        let layer = tracing_subscriber::fmt::layer()
            .with_writer(writer)
            .with_ansi(false)
            .json()
            .with_span_events(FmtSpan::CLOSE)
            .with_filter(EnvFilter::new(format!("medini_voice={}", config.level)));
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    let installed = tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .is_ok();

    if installed {
        tracing::info!(
            level = %config.level,
            file_logging = config.file_logging,
            logs_dir = ?logs_dir,
            "Logging initialized"
        );
    }

    Ok(guard)
}
