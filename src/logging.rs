//! Logging setup for flowprep.
//!
//! Everything in the crate logs through `tracing` macros; this module installs the
//! subscriber. Output goes to the console and, when enabled, to daily-rotating
//! files in the platform data directory:
//!
//! - `flowprep.YYYY-MM-DD.log`: every event that passes the filter
//! - `error.YYYY-MM-DD.log`: warnings and errors only
//!
//! The filter defaults to `info` and can be overridden with `RUST_LOG`.
//!
//! ```no_run
//! use flowprep::logging::{self, LoggingConfig};
//!
//! let _guards = logging::init(&LoggingConfig::default())?;
//! tracing::info!("started");
//! # Ok::<(), anyhow::Error>(())
//! ```

use anyhow::{Context as _, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    EnvFilter, Layer as _, fmt, layer::SubscriberExt as _, util::SubscriberInitExt as _,
};

const MAX_LOG_FILES: usize = 10;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is unset.
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default = "default_true")]
    pub file_logging: bool,
    /// Overrides the platform log directory.
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
    /// Emit JSON lines on the console instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

fn default_level() -> String {
    "info".to_owned()
}

fn default_true() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            file_logging: default_true(),
            log_dir: None,
            json: false,
        }
    }
}

/// Gets the log directory path based on platform conventions
///
/// Returns:
/// - Windows: `%APPDATA%/flowprep/logs`
/// - macOS: `~/Library/Application Support/flowprep/logs`
/// - Linux: `~/.local/share/flowprep/logs`
///
/// # Errors
///
/// Fails when no data directory exists or the directory cannot be created.
pub fn log_dir(config: &LoggingConfig) -> Result<PathBuf> {
    let log_dir = match &config.log_dir {
        Some(dir) => dir.clone(),
        None => dirs::data_dir()
            .context("Failed to determine data directory")?
            .join("flowprep")
            .join("logs"),
    };

    if !log_dir.exists() {
        std::fs::create_dir_all(&log_dir)
            .with_context(|| format!("Failed to create log directory: {}", log_dir.display()))?;
    }
    Ok(log_dir)
}

/// Install the global subscriber.
///
/// The returned guards flush the file writers when dropped; keep them alive for the
/// life of the process.
///
/// # Errors
///
/// Fails if the log directory or file appenders cannot be created, the filter does
/// not parse, or a global subscriber is already installed.
pub fn init(config: &LoggingConfig) -> Result<Vec<WorkerGuard>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .context("Failed to create env filter")?;

    let stdout_layer = if config.json {
        fmt::layer().with_target(true).json().boxed()
    } else {
        fmt::layer()
            .with_target(true)
            .with_thread_names(true)
            .compact()
            .boxed()
    };

    let mut guards = Vec::new();
    let mut file_layers = Vec::new();
    let mut dir = None;
    if config.file_logging {
        let log_dir = log_dir(config)?;

        let all_logs_appender = RollingFileAppender::builder()
            .rotation(Rotation::DAILY)
            .max_log_files(MAX_LOG_FILES)
            .filename_prefix("flowprep")
            .filename_suffix("log")
            .build(&log_dir)
            .context("Failed to create all-logs file appender")?;
        let error_logs_appender = RollingFileAppender::builder()
            .rotation(Rotation::DAILY)
            .max_log_files(MAX_LOG_FILES)
            .filename_prefix("error")
            .filename_suffix("log")
            .build(&log_dir)
            .context("Failed to create error-logs file appender")?;

        let (all_writer, all_guard) = tracing_appender::non_blocking(all_logs_appender);
        let (error_writer, error_guard) = tracing_appender::non_blocking(error_logs_appender);
        guards.push(all_guard);
        guards.push(error_guard);

        file_layers.push(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_line_number(true)
                .with_file(true)
                .with_ansi(false)
                .with_writer(all_writer)
                .boxed(),
        );
        file_layers.push(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_line_number(true)
                .with_file(true)
                .with_ansi(false)
                .with_writer(error_writer)
                .with_filter(EnvFilter::new("warn"))
                .boxed(),
        );
        dir = Some(log_dir);
    }

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layers)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    match dir {
        Some(dir) => tracing::info!("Logging initialized, log directory: {}", dir.display()),
        None => tracing::info!("Logging initialized, console only"),
    }
    Ok(guards)
}
