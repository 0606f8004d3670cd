use std::path::Path;

use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, registry};

pub const LOG_FILE_NAME: &str = "conversion.log";

/// Filter for the persistent log file: everything from this workspace down to
/// debug, third-party crates at info.
const FILE_FILTER: &str = "info,utf8watch=debug,utf8watch_cli=debug";

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("Failed to open log file: {0}")]
    LogFile(#[from] tracing_appender::rolling::InitError),

    #[error("Failed to bridge log records: {0}")]
    LogBridge(#[from] log::SetLoggerError),

    #[error("A global subscriber is already installed: {0}")]
    Subscriber(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// Installs the global subscriber. Debug detail goes to `conversion.log` in
/// `log_dir`; info and above go to stdout as bare messages (`RUST_LOG`
/// overrides the console level). The returned guard flushes the file writer
/// when dropped and must be held for the life of the process.
pub fn init_logging(log_dir: &Path) -> Result<WorkerGuard, LoggingError> {
    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(LOG_FILE_NAME)
        .build(log_dir)?;
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer()
        .with_writer(file_writer)
        .with_ansi(false)
        .with_target(true)
        .with_filter(EnvFilter::new(FILE_FILTER));

    let console_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let console_layer = fmt::layer()
        .with_writer(std::io::stdout)
        .without_time()
        .with_target(false)
        .with_level(false)
        .with_filter(console_filter);

    let subscriber = registry().with(file_layer).with(console_layer);

    tracing_log::LogTracer::init()?;
    tracing::subscriber::set_global_default(subscriber)?;

    Ok(guard)
}
