use std::path::PathBuf;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

#[derive(Debug, thiserror::Error)]
pub enum LogSetupError {
    #[error("Invalid log filter '{filter}': {message}")]
    Filter { filter: String, message: String },
    #[error("Failed to create log directory '{}': {source}", dir.display())]
    Directory {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to create log file appender: {0}")]
    Appender(String),
    #[error("Logging is already initialized")]
    AlreadyInitialized,
}

/// Where and how much to log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogOptions {
    /// Filter used when `RUST_LOG` is unset, e.g. `info` or `mosaic=debug`.
    pub level: String,
    pub dir: PathBuf,
    pub file_prefix: String,
    /// Rolled daily files kept on disk.
    pub max_files: usize,
}

impl Default for LogOptions {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            dir: PathBuf::from("logs"),
            file_prefix: "mosaic".to_string(),
            max_files: 5,
        }
    }
}

impl LogOptions {
    fn filter(&self) -> Result<EnvFilter, LogSetupError> {
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&self.level))
            .map_err(|e| LogSetupError::Filter {
                filter: self.level.clone(),
                message: e.to_string(),
            })
    }
}

/// Installs console and daily-rolling file logging.
///
/// `RUST_LOG` takes precedence over `options.level`. Warnings and errors also
/// go to stderr. Can succeed once per process.
pub fn setup_logging(options: &LogOptions) -> Result<(), LogSetupError> {
    let env_filter = options.filter()?;

    std::fs::create_dir_all(&options.dir).map_err(|source| LogSetupError::Directory {
        dir: options.dir.clone(),
        source,
    })?;

    let file_appender = tracing_appender::rolling::Builder::new()
        .rotation(tracing_appender::rolling::Rotation::DAILY)
        .filename_prefix(&options.file_prefix)
        .filename_suffix("log")
        .max_log_files(options.max_files.max(1))
        .build(&options.dir)
        .map_err(|e| LogSetupError::Appender(e.to_string()))?;

    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
    LOG_GUARD
        .set(guard)
        .map_err(|_| LogSetupError::AlreadyInitialized)?;

    let console_writer = std::io::stdout.and(std::io::stderr.with_min_level(Level::WARN));

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_line_number(true)
        .with_ansi(true)
        .with_writer(console_writer);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_line_number(true)
        .with_file(true)
        .with_thread_ids(true)
        .with_ansi(false)
        .with_writer(file_writer);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|_| LogSetupError::AlreadyInitialized)
}

/// Test subscriber writing through the libtest capture. Safe to call repeatedly.
pub fn init_test_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_from_partial_yaml() {
        let options: LogOptions = serde_yml::from_str("level: debug\nmax_files: 2\n").unwrap();
        assert_eq!(options.level, "debug");
        assert_eq!(options.max_files, 2);
        assert_eq!(options.dir, PathBuf::from("logs"));
        assert_eq!(options.file_prefix, "mosaic");
    }

    #[test]
    fn test_invalid_filter_is_reported() {
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        let options = LogOptions {
            level: "mosaic=loud".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            options.filter(),
            Err(LogSetupError::Filter { .. })
        ));
    }
}
