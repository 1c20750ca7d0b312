use std::path::Path;

use anyhow::{Context, Result};
use core_types::config::LoggingConfig;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Stderr-only tracing at `info`, overridable through `RUST_LOG`.
pub fn init_tracing() -> Result<()> {
    init_tracing_with_config(&LoggingConfig::default()).map(|_| ())
}

/// Install the global subscriber described by `cfg`.
///
/// Returns the file appender guard when a log file is configured; keep it
/// alive for the life of the process or buffered lines are lost.
pub fn init_tracing_with_config(cfg: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cfg.level))
        .context("invalid log filter")?;

    let (file_writer, guard) = if cfg.file.trim().is_empty() {
        (None, None)
    } else {
        let path = Path::new(&cfg.file);
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir)
            .with_context(|| format!("create log directory {}", dir.display()))?;
        let file_name = path
            .file_name()
            .map_or_else(|| "homematch.log".into(), |f| f.to_os_string());
        let appender = tracing_appender::rolling::never(dir, file_name);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        (Some(writer), Some(guard))
    };

    // Stdout carries protocol lines in the daemon, so console logs go to stderr.
    let registry = tracing_subscriber::registry().with(filter);
    let result = if cfg.json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(file_writer.map(|w| fmt::layer().json().with_ansi(false).with_writer(w)))
            .try_init()
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .with(file_writer.map(|w| fmt::layer().with_ansi(false).with_writer(w)))
            .try_init()
    };
    result.context("install tracing subscriber")?;
    Ok(guard)
}
