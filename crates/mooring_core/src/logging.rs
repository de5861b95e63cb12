//! Structured logging setup with console and optional file output.
//!
//! Provides:
//! - Console logging by default, which suits serverless runtimes
//! - Daily rotating log files when a log directory is configured
//! - Console-only fallback when file logging fails
//! - Environment variable override via MOORING_LOG or RUST_LOG
//!
//! Initializing twice is harmless: warm invocations reuse the subscriber
//! installed by the first one.

use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

/// Logging configuration.
pub struct LogConfig {
    /// Directory for log files (None = console only)
    pub log_dir: Option<PathBuf>,
    /// Whether stdout is an interactive terminal (enables ANSI colors)
    pub is_pty: bool,
    /// Optional custom log filter
    pub log_filter: Option<String>,
}

impl LogConfig {
    /// Console-only logging.
    pub fn console() -> Self {
        Self { log_dir: None, is_pty: atty::is(atty::Stream::Stdout), log_filter: None }
    }

    /// Console plus daily rotating files in `log_dir`.
    pub fn with_log_dir(log_dir: impl Into<PathBuf>) -> Self {
        Self { log_dir: Some(log_dir.into()), ..Self::console() }
    }

    /// Set custom log filter.
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.log_filter = Some(filter.into());
        self
    }
}

/// Guard that must be held for the lifetime of the process.
///
/// Dropping this guard flushes pending file log entries.
pub struct LoggingGuard {
    worker_guard: Option<WorkerGuard>,
}

impl LoggingGuard {
    /// Whether log entries are also written to a file.
    pub fn writes_to_file(&self) -> bool {
        self.worker_guard.is_some()
    }
}

/// Initialize logging with the given configuration.
///
/// If file logging initialization fails, falls back to console only.
pub fn init_logging(config: LogConfig) -> LoggingGuard {
    let Some(log_dir) = config.log_dir.as_deref() else {
        return init_stdout_logging(config.log_filter.as_deref(), config.is_pty);
    };

    match init_file_logging(log_dir, &config) {
        Ok(guard) => LoggingGuard { worker_guard: Some(guard) },
        Err(e) => {
            eprintln!("Warning: Failed to initialize file logging: {}. Using console only.", e);
            init_stdout_logging(config.log_filter.as_deref(), config.is_pty)
        }
    }
}

/// Initialize console logging with defaults (convenience function).
pub fn init_logging_default() -> LoggingGuard {
    init_logging(LogConfig::console())
}

/// Initialize stdout-only logging.
fn init_stdout_logging(filter: Option<&str>, ansi: bool) -> LoggingGuard {
    let installed = tracing_subscriber::fmt()
        .with_env_filter(build_env_filter(filter))
        .with_ansi(ansi)
        .with_target(false)
        .with_thread_ids(false)
        .try_init()
        .is_ok();

    if !installed {
        tracing::debug!("Global subscriber already installed, keeping it");
    }
    LoggingGuard { worker_guard: None }
}

/// Initialize file + console logging.
fn init_file_logging(
    log_dir: &Path,
    config: &LogConfig,
) -> Result<WorkerGuard, Box<dyn std::error::Error + Send + Sync>> {
    let file_appender = build_file_appender(log_dir)?;

    // Non-blocking so request paths never wait on disk
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let stdout = std::io::stdout.with_max_level(tracing::Level::INFO);
    let combined = stdout.and(non_blocking);

    tracing_subscriber::fmt()
        .with_writer(combined)
        .with_env_filter(build_env_filter(config.log_filter.as_deref()))
        .with_ansi(config.is_pty)
        .with_target(true)
        .with_thread_ids(false)
        .try_init()?;

    Ok(guard)
}

/// Create the log directory and a daily rotating appender inside it.
fn build_file_appender(
    log_dir: &Path,
) -> Result<RollingFileAppender, Box<dyn std::error::Error + Send + Sync>> {
    std::fs::create_dir_all(log_dir)?;

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("mooring")
        .filename_suffix("log")
        .build(log_dir)?;
    Ok(appender)
}

/// Build the environment filter from config or defaults.
fn build_env_filter(custom_filter: Option<&str>) -> EnvFilter {
    // Priority: custom filter > MOORING_LOG > RUST_LOG > default
    if let Some(filter) = custom_filter {
        return EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new(default_log_filter()));
    }

    EnvFilter::try_from_env("MOORING_LOG")
        .or_else(|_| EnvFilter::try_from_env("RUST_LOG"))
        .unwrap_or_else(|_| EnvFilter::new(default_log_filter()))
}

/// Get the default log filter based on build type.
pub fn default_log_filter() -> &'static str {
    #[cfg(debug_assertions)]
    {
        "info,mooring_core=trace"
    }
    #[cfg(not(debug_assertions))]
    {
        "warn,mooring_core=info"
    }
}

/// Get the default log directory.
pub fn log_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("mooring")
        .join("logs")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_appender_creates_directory() {
        let temp = tempfile::tempdir().unwrap();
        let dir = temp.path().join("nested").join("logs");

        build_file_appender(&dir).unwrap();
        assert!(dir.is_dir());
    }

    #[test]
    fn custom_filter_is_used() {
        let filter = build_env_filter(Some("mooring_core=warn"));
        assert_eq!(filter.to_string(), "mooring_core=warn");
    }

    #[test]
    fn default_log_dir_is_namespaced() {
        assert!(log_dir().ends_with("mooring/logs"));
    }

    #[test]
    fn config_builders() {
        let config = LogConfig::with_log_dir("/tmp/mooring").with_filter("debug");
        assert_eq!(config.log_dir.as_deref(), Some(Path::new("/tmp/mooring")));
        assert_eq!(config.log_filter.as_deref(), Some("debug"));
        assert!(LogConfig::console().log_dir.is_none());
    }
}
