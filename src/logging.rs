//! Logging module for the GlowSync daemon.
//!
//! Configures tracing with a compact human-readable layer on stderr and a
//! JSON layer into a daily-rotated file under the user's local data
//! directory.

use std::path::PathBuf;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt::{self, time::UtcTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Log directory name under the user's local data directory.
const LOG_DIR: &str = "glowsync";
/// Maximum number of rotated log files to retain.
const MAX_LOG_FILES: usize = 3;

/// Initialize the logging system with both stderr and file output.
///
/// The stderr layer is compact and human-readable; the file layer writes
/// JSON records with timestamps and source locations. Rotation is daily,
/// retaining the last 3 files. Log level defaults to `info` and can be
/// overridden through `RUST_LOG`.
pub fn init_logging() -> Result<LogGuard, LoggingError> {
    let log_dir = log_directory()?;

    std::fs::create_dir_all(&log_dir).map_err(|e| LoggingError::DirectoryCreationFailed {
        path: log_dir.display().to_string(),
        source: e,
    })?;

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .max_log_files(MAX_LOG_FILES)
        .filename_prefix("daemon")
        .filename_suffix("log")
        .build(&log_dir)
        .map_err(|e| LoggingError::AppenderCreationFailed(e.to_string()))?;

    let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file_appender);
    let (non_blocking_stderr, stderr_guard) = tracing_appender::non_blocking(std::io::stderr());

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // JSON layer for the file.
    let file_layer = fmt::layer()
        .json()
        .with_timer(UtcTime::rfc_3339())
        .with_file(true)
        .with_line_number(true)
        .with_writer(non_blocking_file);

    // Compact layer for the terminal.
    let stderr_layer = fmt::layer()
        .compact()
        .with_timer(UtcTime::rfc_3339())
        .with_writer(non_blocking_stderr);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stderr_layer)
        .init();

    Ok(LogGuard {
        _file_guard: file_guard,
        _stderr_guard: stderr_guard,
    })
}

/// Resolve the log directory under the user's local data directory.
fn log_directory() -> Result<PathBuf, LoggingError> {
    dirs::data_local_dir()
        .map(|base| base.join(LOG_DIR))
        .ok_or(LoggingError::DataDirectoryNotFound)
}

/// Guard that keeps the non-blocking writers alive.
/// Must be held for the lifetime of the application.
pub struct LogGuard {
    _file_guard: tracing_appender::non_blocking::WorkerGuard,
    _stderr_guard: tracing_appender::non_blocking::WorkerGuard,
}

/// Errors related to logging initialization.
#[derive(Debug)]
pub enum LoggingError {
    /// No local data directory could be determined for this user.
    DataDirectoryNotFound,
    /// Failed to create the log directory.
    DirectoryCreationFailed {
        path: String,
        source: std::io::Error,
    },
    /// Failed to create the file appender.
    AppenderCreationFailed(String),
}

impl std::fmt::Display for LoggingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoggingError::DataDirectoryNotFound => {
                write!(f, "could not determine the user's local data directory")
            }
            LoggingError::DirectoryCreationFailed { path, source } => {
                write!(f, "failed to create log directory '{}': {}", path, source)
            }
            LoggingError::AppenderCreationFailed(msg) => {
                write!(f, "failed to create log file appender: {}", msg)
            }
        }
    }
}

impl std::error::Error for LoggingError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LoggingError::DirectoryCreationFailed { source, .. } => Some(source),
            _ => None,
        }
    }
}
