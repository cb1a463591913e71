//! Chronoflow scheduler daemon CLI.
//!
//! Starts the reconciler and scheduler against a jobs directory and runs
//! until interrupted.

use anyhow::{Context, Result};
use chronoflow::{Config, EventLogWriter, ExecLogWriter, Reconciler, ReconcilerConfig, Scheduler, SchedulerConfig};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "chronoflowd")]
#[command(about = "Lightweight in-memory job scheduler daemon")]
#[command(version)]
struct Cli {
    /// Directory polled for job definition files. Overrides CHRONOFLOW_JOBS_DIR.
    #[arg(long)]
    jobs_dir: Option<PathBuf>,

    /// Directory for execution and event logs. Overrides CHRONOFLOW_LOG_DIR.
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Verbose (debug-level) ambient logging.
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::from_env().context("failed to load configuration")?;
    if let Some(jobs_dir) = cli.jobs_dir {
        config.jobs_dir = jobs_dir;
    }
    if let Some(log_dir) = cli.log_dir {
        config.log_dir = log_dir;
    }

    let level = if cli.verbose { Level::DEBUG } else { level_from(config.log_level) };
    tracing_subscriber::fmt().with_max_level(level).init();

    info!(
        jobs_dir = %config.jobs_dir.display(),
        log_dir = %config.log_dir.display(),
        "starting chronoflowd"
    );

    std::fs::create_dir_all(&config.jobs_dir)
        .with_context(|| format!("failed to create jobs directory {}", config.jobs_dir.display()))?;
    std::fs::create_dir_all(&config.log_dir)
        .with_context(|| format!("failed to create log directory {}", config.log_dir.display()))?;

    let exec_log = ExecLogWriter::new(config.log_dir.clone());
    let event_log = EventLogWriter::new(&config.log_dir);

    let scheduler = Arc::new(Scheduler::new(
        SchedulerConfig {
            tick_interval: config.tick_interval,
            max_concurrent_jobs: config.max_concurrent_jobs,
            job_timeout: config.job_timeout,
            ..SchedulerConfig::default()
        },
        exec_log,
        event_log.clone(),
    ));
    scheduler.start();

    let reconciler = Reconciler::new(
        ReconcilerConfig {
            jobs_dir: config.jobs_dir.clone(),
            poll_interval: config.poll_interval,
        },
        scheduler.clone(),
        event_log,
    );
    reconciler.start().await;

    wait_for_shutdown_signal().await;
    info!("shutdown signal received, stopping chronoflowd");

    reconciler.stop().await;
    scheduler.stop().await;

    Ok(())
}

fn level_from(level: chronoflow::LogLevel) -> Level {
    match level {
        chronoflow::LogLevel::Trace => Level::TRACE,
        chronoflow::LogLevel::Debug => Level::DEBUG,
        chronoflow::LogLevel::Info => Level::INFO,
        chronoflow::LogLevel::Warn => Level::WARN,
        chronoflow::LogLevel::Error => Level::ERROR,
    }
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    let mut sigint = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");

    tokio::select! {
        _ = sigterm.recv() => {}
        _ = sigint.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
