//! Process-wide logging setup.
//!
//! `RUST_LOG` takes precedence over the verbosity chosen on the command
//! line. Console output always goes to stderr; the daily rolling file sink is optional
//! and is written through a non-blocking worker owned by [`LoggingGuard`].

use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// File name prefix of the rolling log, e.g. `cricclubs-sync.2024-05-01`.
pub const LOG_FILE_PREFIX: &str = "cricclubs-sync";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Number of `-v` flags: 0 = info, 1 = debug, 2+ = trace.
    pub verbosity: u8,
    /// Directory for the rolling file sink; `None` disables it.
    pub log_dir: Option<PathBuf>,
    pub file_prefix: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            verbosity: 0,
            log_dir: None,
            file_prefix: LOG_FILE_PREFIX.to_owned(),
        }
    }
}

impl LoggingConfig {
    #[must_use]
    pub fn default_directive(&self) -> &'static str {
        match self.verbosity {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}

/// Owns the file sink's background writer. Hold it for the life of the
/// process; dropping it flushes pending records and closes the file.
#[must_use = "dropping the guard closes the log file"]
#[derive(Debug)]
pub struct LoggingGuard {
    file: Option<WorkerGuard>,
}

impl LoggingGuard {
    #[must_use]
    pub fn has_file_sink(&self) -> bool {
        self.file.is_some()
    }
}

/// Installs the global subscriber.
///
/// # Errors
/// Returns an error if the log directory cannot be created, the file
/// appender cannot be built, or a global subscriber is already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<LoggingGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.default_directive()));

    // Console output stays off stdout, which carries `check` and
    // `--print-config` results.
    let console = fmt::layer()
        .with_target(true)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal());

    let (file_layer, file_guard) = match &config.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("failed to create log directory {}", dir.display()))?;
            let appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix(&config.file_prefix)
                .build(dir)
                .with_context(|| format!("failed to open log file in {}", dir.display()))?;
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file_layer)
        .try_init()
        .context("failed to install the global tracing subscriber")?;

    tracing::debug!(
        file_sink = file_guard.is_some(),
        directive = config.default_directive(),
        "Logging initialized"
    );
    Ok(LoggingGuard { file: file_guard })
}
