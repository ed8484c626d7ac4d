//! Logging system initialization
//!
//! Sets up tracing-based logging with file output to
//! `<LEDTOGGLE_HOME>/ledtoggle/logs/app.log`. Each startup shifts the previous
//! session's log into a numbered history of at most nine files.

use crate::config::ConfigManager;
use crate::error::{LedToggleError, Result, StringError};
use std::path::Path;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt};

/// Historical log files kept next to the live log (app.log.1 through app.log.9)
const MAX_LOG_FILES: u8 = 9;

/// Name of the live log file
const LOG_FILE_NAME: &str = "app.log";

/// Initialize logging under the application directory
///
/// Level defaults to INFO and can be overridden with `RUST_LOG`.
pub fn init_logging() -> Result<()> {
    init_logging_in(&ConfigManager::get_app_dir().join("logs"))
}

/// Initialize logging into `log_dir`, rotating any previous session's log
pub fn init_logging_in(log_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(log_dir)?;
    rotate_logs_on_startup(&log_dir.join(LOG_FILE_NAME))?;

    // Startup rotation is handled above, so the appender never rolls
    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix("app")
        .filename_suffix("log")
        .build(log_dir)
        .map_err(|e| LedToggleError::ConfigError(Box::new(e)))?;

    let subscriber = fmt()
        .with_writer(file_appender)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| LedToggleError::ConfigError(Box::new(e)))?;

    tracing::info!(
        "ledtoggle v{} started, logging to {}",
        env!("CARGO_PKG_VERSION"),
        log_dir.display()
    );

    Ok(())
}

/// Shift `app.log` -> `app.log.1` -> ... -> `app.log.9`, dropping the oldest
///
/// Missing numbers in the history are skipped, so gaps move up unchanged.
fn rotate_logs_on_startup(log_path: &Path) -> Result<()> {
    if !log_path.exists() {
        return Ok(());
    }

    let log_dir = log_path
        .parent()
        .ok_or_else(|| LedToggleError::ConfigError(StringError::new("Invalid log path")))?;
    let log_name = log_path
        .file_name()
        .ok_or_else(|| LedToggleError::ConfigError(StringError::new("Invalid log filename")))?
        .to_string_lossy();
    let numbered = |n: u8| log_dir.join(format!("{log_name}.{n}"));

    let oldest = numbered(MAX_LOG_FILES);
    if oldest.exists() {
        std::fs::remove_file(&oldest)?;
    }

    for i in (1..MAX_LOG_FILES).rev() {
        let current = numbered(i);
        if current.exists() {
            std::fs::rename(&current, numbered(i + 1))?;
        }
    }

    std::fs::rename(log_path, numbered(1))?;
    Ok(())
}
