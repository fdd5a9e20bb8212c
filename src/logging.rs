// ABOUTME: Tracing setup: append-only run log file plus an opt-in stderr console layer
// ABOUTME: The file receives every outcome record and lifecycle milestone

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::Subscriber;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

pub const DEFAULT_LOG_DIR: &str = "./logs";

/// One log file per server, reused across runs.
pub fn log_path(log_dir: impl AsRef<Path>, host: &str, port: u16) -> PathBuf {
    log_dir
        .as_ref()
        .join(format!("reindex_index_{}_{}.log", host, port))
}

/// Plain-text run log layer: one line per outcome record and milestone.
pub fn run_log_layer<S, W>(writer: W) -> impl Layer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(writer)
        .with_target(false)
        .with_filter(EnvFilter::new("info,tokio_postgres=warn"))
}

pub fn init_logging(log_file_path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = log_file_path.parent() {
        fs::create_dir_all(parent)?;
    }
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file_path)?;

    // Console is silent unless RUST_LOG asks otherwise; outcomes belong in the file.
    let console_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("off"));
    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(console_filter);

    tracing_subscriber::registry()
        .with(console_layer)
        .with(run_log_layer(Mutex::new(log_file)))
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install tracing subscriber: {}", e))?;

    tracing::debug!("Logging to {}", log_file_path.display());
    Ok(())
}
