//! Tracing setup for the command-line front end.
//!
//! Events go to systemd's journal when it is reachable, otherwise to a
//! daily-rolling file. Warnings and errors are echoed to stderr as well so
//! a failed folder cleanup is visible to whoever ran the command.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::level_filters::LevelFilter;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Variable holding an `EnvFilter` directive, e.g. `gameshelf::assets=trace`.
pub const LOG_ENV: &str = "GAMESHELF_LOG";

static FILE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Default file log location when journald is unavailable.
pub fn default_log_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("gameshelf")
        .join("logs")
}

/// Install the global subscriber. Calling it again is a no-op.
pub fn init(log_dir: Option<PathBuf>) -> Result<()> {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));

    #[cfg(target_os = "linux")]
    {
        if let Ok(journald) = tracing_journald::layer() {
            let installed = tracing_subscriber::registry()
                .with(journald.with_filter(filter))
                .with(stderr_layer())
                .try_init()
                .is_ok();
            if installed {
                tracing::debug!("logging to journald");
            }
            return Ok(());
        }
    }

    let log_dir = log_dir.unwrap_or_else(default_log_dir);
    let file = file_layer(&log_dir)?;

    if tracing_subscriber::registry()
        .with(file.with_filter(filter))
        .with(stderr_layer())
        .try_init()
        .is_ok()
    {
        tracing::debug!(dir = %log_dir.display(), "logging to file");
    }
    Ok(())
}

fn stderr_layer<S>() -> impl Layer<S>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .with_filter(LevelFilter::WARN)
}

fn file_layer<S>(log_dir: &Path) -> Result<impl Layer<S>>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;

    let appender = tracing_appender::rolling::daily(log_dir, "gameshelf.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    // A second init keeps the first writer.
    let _ = FILE_GUARD.set(guard);

    Ok(fmt::layer().with_writer(writer).with_ansi(false))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_init_twice_is_harmless() {
        let dir = tempdir().unwrap();
        init(Some(dir.path().join("logs"))).unwrap();
        init(Some(dir.path().join("logs"))).unwrap();
        tracing::info!("still running");
    }

    #[test]
    fn test_default_log_dir_is_namespaced() {
        assert!(default_log_dir().ends_with("gameshelf/logs"));
    }
}
