use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

fn env_filter() -> EnvFilter {
  EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Directory holding the rolling log files.
pub fn log_dir() -> Option<PathBuf> {
  ProjectDirs::from("", "", "reel").map(|dirs| dirs.data_local_dir().join("logs"))
}

/// Log to a daily rolling file. The terminal belongs to the UI, so nothing goes to stdout/stderr.
///
/// Keep the returned guard alive until exit so buffered lines are flushed.
pub fn init_file_logging() -> Result<WorkerGuard> {
  let dir = log_dir().context("Could not determine a data directory for logs")?;
  std::fs::create_dir_all(&dir).with_context(|| format!("Could not create log directory {}", dir.display()))?;

  let appender = tracing_appender::rolling::daily(&dir, "reel.log");
  let (writer, guard) = tracing_appender::non_blocking(appender);

  tracing_subscriber::fmt()
    .with_env_filter(env_filter())
    .with_writer(writer)
    .with_ansi(false)
    .try_init()
    .map_err(|e| anyhow!(e))
    .context("Setting default subscriber failed")?;
  Ok(guard)
}

/// Log to stderr, for the non-interactive subcommands. Quiet unless `RUST_LOG` asks otherwise.
pub fn init_stderr_logging() -> Result<()> {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .with_target(false)
    .try_init()
    .map_err(|e| anyhow!(e))
    .context("Setting default subscriber failed")
}
