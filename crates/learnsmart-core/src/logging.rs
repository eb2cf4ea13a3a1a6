//! Tracing subscriber setup.
//!
//! Filter resolution: `LEARNSMART_LOG` (an `EnvFilter` directive) wins, then
//! `debug` when debug mode is on, else `warn`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use crate::config::Config;

pub const LOG_ENV: &str = "LEARNSMART_LOG";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogOptions {
    pub debug: bool,
    /// Write logs to this file instead of stderr.
    pub file: Option<PathBuf>,
}

impl From<&Config> for LogOptions {
    fn from(config: &Config) -> Self {
        Self {
            debug: config.debug,
            file: config.log_file.clone(),
        }
    }
}

/// Keeps the background log writer alive. Drop it last.
#[derive(Debug)]
pub struct LogGuard {
    _writer: Option<WorkerGuard>,
}

fn default_directive(debug: bool) -> &'static str {
    if debug { "debug" } else { "warn" }
}

fn build_filter(options: &LogOptions) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(default_directive(options.debug)))
}

/// Installs the global subscriber.
///
/// Calling it again is harmless: the first subscriber stays installed.
///
/// # Errors
/// Returns an error if the log file's directory cannot be created.
pub fn init(options: &LogOptions) -> Result<LogGuard> {
    let filter = build_filter(options);

    let Some(path) = options.file.as_deref() else {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init();
        return Ok(LogGuard { _writer: None });
    };

    let (dir, file_name) = split_log_path(path)?;
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create log directory {}", dir.display()))?;

    let appender = tracing_appender::rolling::never(&dir, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(writer)
        .try_init();

    Ok(LogGuard {
        _writer: Some(guard),
    })
}

fn split_log_path(path: &Path) -> Result<(PathBuf, &std::ffi::OsStr)> {
    let file_name = path
        .file_name()
        .with_context(|| format!("Log file path has no file name: {}", path.display()))?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    Ok((dir, file_name))
}
