//! Runtime configuration, loaded entirely from the environment (and an
//! optional `.env` file). There is no config file format — every setting
//! has a sane default and can be overridden by one env var.

use std::env;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },
}

/// `tracing-subscriber`'s `EnvFilter` understands more than this, but the
/// scheduler only ever sets one of these five levels for itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(()),
        }
    }
}

/// Runtime configuration for a `chronoflowd` process.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory polled for job definition files.
    pub jobs_dir: PathBuf,
    /// Directory under which per-execution logs (C5) and the scheduler
    /// event log (C6) are written.
    pub log_dir: PathBuf,
    /// How often the reconciler re-scans `jobs_dir`.
    pub poll_interval: Duration,
    /// How often the scheduler checks for due entries.
    pub tick_interval: Duration,
    /// Upper bound on concurrently running executions.
    pub max_concurrent_jobs: usize,
    /// Wall-clock timeout applied to every execution.
    pub job_timeout: Duration,
    /// Ambient diagnostic log verbosity.
    pub log_level: LogLevel,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            jobs_dir: PathBuf::from("/etc/chronoflow/jobs.d"),
            log_dir: PathBuf::from("./logs"),
            poll_interval: Duration::from_secs(2),
            tick_interval: Duration::from_secs(1),
            max_concurrent_jobs: 50,
            job_timeout: Duration::from_secs(3600),
            log_level: LogLevel::Info,
        }
    }
}

impl Config {
    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset. Loads a `.env` file first if present, so
    /// `CHRONOFLOW_*` vars can live alongside a project's other dotenv
    /// entries without a process manager needing to inject them directly.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let mut config = Self::default();

        if let Ok(v) = env::var("CHRONOFLOW_JOBS_DIR") {
            config.jobs_dir = PathBuf::from(v);
        }

        if let Ok(v) = env::var("CHRONOFLOW_LOG_DIR") {
            config.log_dir = PathBuf::from(v);
        }

        if let Ok(v) = env::var("CHRONOFLOW_POLL_INTERVAL_SECONDS") {
            config.poll_interval = Duration::from_secs(parse_u64("CHRONOFLOW_POLL_INTERVAL_SECONDS", &v)?);
        }

        if let Ok(v) = env::var("CHRONOFLOW_TICK_INTERVAL_SECONDS") {
            config.tick_interval = Duration::from_secs(parse_u64("CHRONOFLOW_TICK_INTERVAL_SECONDS", &v)?);
        }

        if let Ok(v) = env::var("CHRONOFLOW_MAX_CONCURRENT_JOBS") {
            config.max_concurrent_jobs = parse_u64("CHRONOFLOW_MAX_CONCURRENT_JOBS", &v)? as usize;
        }

        if let Ok(v) = env::var("CHRONOFLOW_JOB_TIMEOUT_SECONDS") {
            config.job_timeout = Duration::from_secs(parse_u64("CHRONOFLOW_JOB_TIMEOUT_SECONDS", &v)?);
        }

        if let Ok(v) = env::var("CHRONOFLOW_LOG_LEVEL") {
            config.log_level = v.parse().map_err(|_| ConfigError::InvalidValue {
                key: "CHRONOFLOW_LOG_LEVEL".to_string(),
                reason: format!("unrecognized log level `{v}`"),
            })?;
        }

        Ok(config)
    }
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        reason: format!("expected a positive integer, got `{value}`"),
    })
}
