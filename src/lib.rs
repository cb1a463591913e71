//! Chronoflow: a lightweight in-memory job scheduler daemon.
//!
//! Jobs are declared as files in a directory; a reconciler polls that
//! directory and keeps the scheduler's registry in sync, while the scheduler
//! itself fires cron and one-shot schedules on a tick loop and dispatches
//! executions to a bounded worker pool.

pub mod config;
pub mod event_log;
pub mod exec_log;
pub mod executor;
pub mod job;
pub mod reconciler;
pub mod schedule;
pub mod scheduler;

pub use config::{Config, ConfigError, LogLevel};
pub use event_log::{Event, EventLogWriter};
pub use exec_log::{ExecLogWriter, ExecutionRecord};
pub use executor::{ExecutionOutcome, TaskExecutor};
pub use job::{Job, JobParseError, Task};
pub use reconciler::{Reconciler, ReconcilerConfig};
pub use schedule::{ScheduleEntry, ScheduleError, ScheduleManager, ScheduleOutcome};
pub use scheduler::{Scheduler, SchedulerConfig};
