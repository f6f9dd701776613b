use crate::config::AppConfig;
use crate::error::MemoriaError;
use std::fs::File;
use std::path::Path;
use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

/// Log file name inside the log directory
pub const LOG_FILE_NAME: &str = "memoria.log";

/// Initialize logging from configuration (console + file)
pub fn init_from_config(config: &AppConfig) -> Result<(), MemoriaError> {
    setup_logging(&config.log_dir, &config.log_level)
}

/// Initialize logging to both console and `<log_dir>/memoria.log`
///
/// `RUST_LOG` takes precedence over `log_level`. Console output goes to
/// stderr so command output on stdout stays machine readable.
pub fn setup_logging(log_dir: &Path, log_level: &str) -> Result<(), MemoriaError> {
    let log_file = open_log_file(log_dir)?;

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_line_number(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_filter(env_filter(log_level));

    let file_layer = fmt::layer()
        .with_writer(log_file)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .with_ansi(false)
        .with_filter(env_filter(log_level));

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| MemoriaError::config(format!("Failed to install subscriber: {}", e)))?;

    tracing::info!(
        "Logging initialized: level={}, log_file={}",
        log_level,
        log_dir.join(LOG_FILE_NAME).display()
    );

    Ok(())
}

fn env_filter(log_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(parse_log_level(log_level).as_str().to_lowercase()))
}

fn open_log_file(log_dir: &Path) -> Result<File, MemoriaError> {
    std::fs::create_dir_all(log_dir).map_err(|e| {
        MemoriaError::config(format!(
            "Failed to create log directory {}: {}",
            log_dir.display(),
            e
        ))
    })?;

    let path = log_dir.join(LOG_FILE_NAME);
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|e| {
            MemoriaError::config(format!("Failed to open log file {}: {}", path.display(), e))
        })
}

/// Parse string to tracing Level, defaulting to INFO
pub fn parse_log_level(level: &str) -> Level {
    match level.trim().to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}
