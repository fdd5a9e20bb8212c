// ABOUTME: CLI entry point for the PostgreSQL reindex driver
// ABOUTME: Loads configuration, installs logging and runs the orchestrator

use clap::builder::RangedU64ValueParser;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, warn};

use postgres_reindexer::config::DEFAULT_CONFIG_PATH;
use postgres_reindexer::logging::{self, DEFAULT_LOG_DIR};
use postgres_reindexer::postgres::PgConnector;
use postgres_reindexer::worker::DEFAULT_WORKERS;
use postgres_reindexer::{Orchestrator, ReindexConfig, ReindexError, RunOptions};

#[derive(Parser, Debug)]
#[command(name = "postgres-reindexer")]
#[command(
    about = "Rebuild every index in every user database of a PostgreSQL server",
    long_about = None
)]
#[command(version)]
struct Cli {
    /// Path to the database config file (JSON, or TOML with a .toml extension)
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Number of concurrent workers per database
    #[arg(
        short,
        long,
        default_value_t = DEFAULT_WORKERS,
        value_parser = RangedU64ValueParser::<usize>::new().range(1..)
    )]
    workers: usize,

    /// Directory for the run log
    #[arg(long, default_value = DEFAULT_LOG_DIR)]
    log_dir: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match ReindexConfig::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{:#}", anyhow::Error::from(e));
            return ExitCode::FAILURE;
        }
    };

    let log_file = logging::log_path(
        &cli.log_dir,
        &config.credentials.host,
        config.credentials.port,
    );
    if let Err(e) = logging::init_logging(&log_file) {
        eprintln!("Failed to initialize logging at {}: {:#}", log_file.display(), e);
        return ExitCode::FAILURE;
    }

    info!(
        version = env!("CARGO_PKG_VERSION"),
        workers = cli.workers,
        "Starting reindex of {}:{}",
        config.credentials.host,
        config.credentials.port
    );
    if cli.workers > config.pool.max_open {
        warn!(
            workers = cli.workers,
            max_open = config.pool.max_open,
            "More workers than pooled connections; workers will queue for a connection"
        );
        println!(
            "Warning: {} workers share {} pooled connections per database",
            cli.workers, config.pool.max_open
        );
    }

    let connector = PgConnector::new(
        config.credentials.clone(),
        config.pool,
        config.statement_timeout(),
    );
    let orchestrator = Orchestrator::new(connector, RunOptions::from_config(&config, cli.workers));

    let cancel = orchestrator.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, letting in-flight rebuilds finish");
            eprintln!("Interrupt received, letting in-flight rebuilds finish");
            cancel.cancel();
        }
    });

    match orchestrator.run().await {
        Ok(_) => ExitCode::SUCCESS,
        Err(ReindexError::Cancelled) => {
            error!("Run cancelled before completion");
            eprintln!("Run cancelled before completion");
            ExitCode::from(130)
        }
        Err(e) => {
            let report = anyhow::Error::from(e);
            error!("{:#}", report);
            eprintln!("{:#}", report);
            ExitCode::FAILURE
        }
    }
}
