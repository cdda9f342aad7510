use std::path::PathBuf;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Logging configuration. `RUST_LOG` overrides `level` when set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Base filter directive, e.g. `"info"` or `"chromalign=debug"`.
    pub level: String,
    /// Directory for daily-rolling log files. Console only when `None`.
    pub directory: Option<PathBuf>,
    /// File name prefix of rolled log files.
    pub file_prefix: String,
    /// Number of rolled files kept on disk.
    pub max_files: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: None,
            file_prefix: "chromalign".to_string(),
            max_files: 5,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LogSetupError {
    #[error("Invalid log filter '{filter}': {message}")]
    InvalidFilter { filter: String, message: String },
    #[error("Failed to create log directory '{path}': {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to create log file appender: {0}")]
    Appender(String),
    #[error("Logger initialization failed: {0}")]
    Init(String),
}

/// Install the global tracing subscriber.
///
/// Console output goes to stdout, with warnings and errors mirrored to stderr.
/// A file layer is added when `config.directory` is set.
pub fn setup_logging(config: &LogConfig) -> Result<(), LogSetupError> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| LogSetupError::InvalidFilter {
            filter: config.level.clone(),
            message: e.to_string(),
        })?;

    let console_writer = std::io::stdout.and(std::io::stderr.with_max_level(Level::WARN));
    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_line_number(true)
        .with_file(true)
        .with_ansi(true)
        .with_writer(console_writer);

    let file_layer = match &config.directory {
        Some(dir) => {
            std::fs::create_dir_all(dir).map_err(|source| LogSetupError::CreateDir {
                path: dir.clone(),
                source,
            })?;

            let file_appender = tracing_appender::rolling::Builder::new()
                .rotation(tracing_appender::rolling::Rotation::DAILY)
                .filename_prefix(&config.file_prefix)
                .filename_suffix("log")
                .max_log_files(config.max_files.max(1))
                .build(dir)
                .map_err(|e| LogSetupError::Appender(e.to_string()))?;

            let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
            // A second setup call keeps the first guard; the init below then fails.
            let _ = LOG_GUARD.set(guard);

            Some(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_line_number(true)
                    .with_file(true)
                    .with_ansi(false)
                    .with_writer(file_writer),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| LogSetupError::Init(e.to_string()))
}
