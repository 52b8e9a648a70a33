use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Arc;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Environment variable pointing at the log file. Defaults to
/// `logs/email_scheduler.log` when unset.
pub const LOG_FILE_VAR: &str = "LOG_FILE";

/// Environment variable enabling console output alongside the log file.
pub const CONSOLE_OUTPUT_VAR: &str = "CONSOLE_OUTPUT";

const DEFAULT_LOG_FILE: &str = "logs/email_scheduler.log";

fn truthy(value: &str) -> bool {
    matches!(
        value.to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "y" | "t"
    )
}

/// Initialize process-wide tracing from the environment.
///
/// Writes to the file named by `LOG_FILE` (directories are created as
/// needed; falls back to the current directory when that path is not
/// writable) and additionally to stderr when `CONSOLE_OUTPUT` is truthy.
/// The filter honors `RUST_LOG`, defaulting to `info`.
///
/// Safe to call more than once; subsequent calls are no-ops.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let log_path = std::env::var(LOG_FILE_VAR).unwrap_or_else(|_| DEFAULT_LOG_FILE.to_owned());
    let file = open_log_file(&log_path)
        .or_else(|_| open_log_file("email_scheduler.log"))
        .ok();

    let file_layer = file.map(|file| {
        tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(Arc::new(file))
            .boxed()
    });

    let console_enabled = std::env::var(CONSOLE_OUTPUT_VAR)
        .map(|v| truthy(&v))
        .unwrap_or(false);
    let console_layer = console_enabled.then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .boxed()
    });

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(console_layer)
        .try_init();
}

fn open_log_file(path: &str) -> std::io::Result<std::fs::File> {
    if let Some(dir) = Path::new(path).parent()
        && !dir.as_os_str().is_empty()
    {
        std::fs::create_dir_all(dir)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}
