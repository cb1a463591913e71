//! Scheduler lifecycle and registry-mutation event log.
//!
//! Single append-only file at `<log_dir>/scheduler.log`. Writes are
//! best-effort: a failure here is reported to stderr and never propagated —
//! this writer must not be able to stop the scheduler.

use chrono::Utc;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// A single lifecycle or registry-mutation event.
#[derive(Debug, Clone)]
pub enum Event<'a> {
    Start,
    Stop,
    Add { job_id: &'a str },
    Update { job_id: &'a str },
    ScheduleChange {
        job_id: &'a str,
        old_schedule: &'a str,
        new_schedule: &'a str,
    },
    Delete { job_id: &'a str },
    Error { job_id: Option<&'a str>, error: &'a str },
}

#[derive(Debug, Clone)]
pub struct EventLogWriter {
    path: PathBuf,
}

impl EventLogWriter {
    pub fn new(log_dir: impl AsRef<Path>) -> Self {
        Self {
            path: log_dir.as_ref().join("scheduler.log"),
        }
    }

    pub fn log(&self, event: &Event<'_>) {
        let line = Self::format_line(event);
        if let Err(e) = self.append(&line) {
            eprintln!("chronoflow: failed to write event log ({e}): {line}");
        }
    }

    fn append(&self, line: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        writeln!(file, "{line}")
    }

    fn format_line(event: &Event<'_>) -> String {
        let ts = Utc::now().to_rfc3339();
        match event {
            Event::Start => format!("[{ts}] START"),
            Event::Stop => format!("[{ts}] STOP"),
            Event::Add { job_id } => format!("[{ts}] ADD job_id={job_id}"),
            Event::Update { job_id } => format!("[{ts}] UPDATE job_id={job_id}"),
            Event::ScheduleChange {
                job_id,
                old_schedule,
                new_schedule,
            } => format!(
                "[{ts}] SCHEDULE_CHANGE job_id={job_id} old_schedule={old_schedule} new_schedule={new_schedule}"
            ),
            Event::Delete { job_id } => format!("[{ts}] DELETE job_id={job_id}"),
            Event::Error { job_id: Some(id), error } => format!("[{ts}] ERROR job_id={id} error={error}"),
            Event::Error { job_id: None, error } => format!("[{ts}] ERROR error={error}"),
        }
    }
}
