use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Local;

use crate::error::AppError;

static LOG_FILE: Mutex<Option<PathBuf>> = Mutex::new(None);

/// Point the file sink at `<data_dir>/logs/agent_platform_<date>.log`.
pub fn init_logging(data_dir: &Path) -> Result<PathBuf, AppError> {
    let logs_dir = data_dir.join("logs");
    fs::create_dir_all(&logs_dir)?;

    let log_file = logs_dir.join(format!(
        "agent_platform_{}.log",
        Local::now().format("%Y-%m-%d")
    ));

    let mut guard = LOG_FILE
        .lock()
        .map_err(|e| AppError::Internal(format!("log file lock poisoned: {e}")))?;
    *guard = Some(log_file.clone());
    drop(guard);

    tracing::info!("Logging initialized. Log file: {:?}", log_file);

    Ok(log_file)
}

pub fn log_to_file(level: &str, target: &str, message: &str) {
    if let Ok(guard) = LOG_FILE.lock() {
        if let Some(ref path) = *guard {
            if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
                let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
                let _ = writeln!(file, "{} [{}] {}: {}", timestamp, level, target, message);
            }
        }
    }
}

#[macro_export]
macro_rules! log_info {
    ($target:expr, $($arg:tt)*) => ({
        let msg = format!($($arg)*);
        $crate::logging::log_to_file("INFO", $target, &msg);
        tracing::info!(target: $target, "{}", msg);
    });
}

#[macro_export]
macro_rules! log_warn {
    ($target:expr, $($arg:tt)*) => ({
        let msg = format!($($arg)*);
        $crate::logging::log_to_file("WARN", $target, &msg);
        tracing::warn!(target: $target, "{}", msg);
    });
}

#[macro_export]
macro_rules! log_error {
    ($target:expr, $($arg:tt)*) => ({
        let msg = format!($($arg)*);
        $crate::logging::log_to_file("ERROR", $target, &msg);
        tracing::error!(target: $target, "{}", msg);
    });
}

/// Install the global fmt subscriber. Safe to call more than once; later
/// calls are ignored.
pub fn init_tracing(default_filter: &str) {
    use tracing_subscriber::EnvFilter;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .try_init()
        .is_ok();

    if installed {
        log_to_file("INFO", "agent_platform", "Application started");
    }
}
