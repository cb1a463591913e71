//! Per-execution log writer.
//!
//! One file per execution at `<log_dir>/<job_id>/<execution_id>.log`, fixed
//! key-prefixed text format. Write failure is reported by the caller to the
//! event log — this module never touches it, to keep the two writers
//! independently testable.

use chrono::{DateTime, Utc};
use std::fmt::Write as _;
use std::path::PathBuf;
use uuid::Uuid;

pub struct ExecutionRecord<'a> {
    pub execution_id: &'a str,
    pub job_id: &'a str,
    pub command: &'a str,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: &'a str,
    pub exit_code: i32,
    pub stdout: &'a str,
    pub stderr: &'a str,
}

#[derive(Debug, Clone)]
pub struct ExecLogWriter {
    log_dir: PathBuf,
}

impl ExecLogWriter {
    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        Self {
            log_dir: log_dir.into(),
        }
    }

    /// A fresh 128-bit random hex execution id.
    pub fn new_execution_id() -> String {
        Uuid::new_v4().simple().to_string()
    }

    pub fn write(&self, record: &ExecutionRecord<'_>) -> std::io::Result<PathBuf> {
        let job_dir = self.log_dir.join(record.job_id);
        std::fs::create_dir_all(&job_dir)?;
        let path = job_dir.join(format!("{}.log", record.execution_id));
        std::fs::write(&path, Self::render(record))?;
        Ok(path)
    }

    fn render(record: &ExecutionRecord<'_>) -> String {
        let duration_seconds =
            (record.end_time - record.start_time).num_milliseconds().max(0) as f64 / 1000.0;

        let mut body = String::new();
        let _ = writeln!(body, "execution_id: {}", record.execution_id);
        let _ = writeln!(body, "job_id: {}", record.job_id);
        let _ = writeln!(body, "command: {}", record.command);
        let _ = writeln!(body, "start_time: {}", record.start_time.to_rfc3339());
        let _ = writeln!(body, "end_time: {}", record.end_time.to_rfc3339());
        let _ = writeln!(body, "duration_seconds: {duration_seconds:.3}");
        let _ = writeln!(body, "status: {}", record.status);
        let _ = writeln!(body, "exit_code: {}", record.exit_code);
        let _ = writeln!(body, "stdout:");
        append_with_trailing_newline(&mut body, record.stdout);
        let _ = writeln!(body, "stderr:");
        append_with_trailing_newline(&mut body, record.stderr);
        body
    }
}

fn append_with_trailing_newline(body: &mut String, text: &str) {
    body.push_str(text);
    if !text.is_empty() && !text.ends_with('\n') {
        body.push('\n');
    }
}
