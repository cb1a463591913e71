//! Job definitions and the parser that turns a definition file into a validated [`Job`].
//!
//! A job file is UTF-8 JSON with the shape documented in the crate's external
//! interfaces: `{job_id, description?, schedule, task: {type, ...}}`. Parsing
//! never partially updates caller state — it either yields a fully validated
//! `Job` or a [`JobParseError`] naming what was wrong.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Immutable job definition, valid once constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub job_id: String,
    #[serde(default)]
    pub description: String,
    pub schedule: String,
    pub task: Task,
}

/// What to run when a job fires. The tag set is open for extension; today
/// only `execute_command` exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Task {
    ExecuteCommand { command: String },
}

impl Task {
    /// The shell command carried by this task, for logging purposes.
    pub fn command(&self) -> &str {
        match self {
            Task::ExecuteCommand { command } => command,
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum JobParseError {
    #[error("job_id is required and must not be empty")]
    MissingJobId,
    #[error("schedule is required and must not be empty")]
    MissingSchedule,
    #[error("task is required")]
    MissingTask,
    #[error("task.command is required and must not be empty")]
    MissingCommand,
    #[error("invalid job definition: {0}")]
    Malformed(String),
    #[error("could not read job file: {0}")]
    Io(String),
}

#[derive(Deserialize)]
struct RawJob {
    job_id: Option<String>,
    #[serde(default)]
    description: Option<String>,
    schedule: Option<String>,
    task: Option<serde_json::Value>,
}

impl Job {
    /// Parse a job definition document. Unknown `task.type` tags fail with a
    /// [`JobParseError::Malformed`] naming the offending tag, courtesy of
    /// serde's own "unknown variant" error text.
    pub fn parse(contents: &str) -> Result<Self, JobParseError> {
        let raw: RawJob =
            serde_json::from_str(contents).map_err(|e| JobParseError::Malformed(e.to_string()))?;

        let job_id = raw
            .job_id
            .filter(|s| !s.is_empty())
            .ok_or(JobParseError::MissingJobId)?;
        let schedule = raw
            .schedule
            .filter(|s| !s.is_empty())
            .ok_or(JobParseError::MissingSchedule)?;
        let task_value = raw.task.ok_or(JobParseError::MissingTask)?;
        let task: Task = serde_json::from_value(task_value)
            .map_err(|e| JobParseError::Malformed(e.to_string()))?;

        if task.command().is_empty() {
            return Err(JobParseError::MissingCommand);
        }

        Ok(Job {
            job_id,
            description: raw.description.unwrap_or_default(),
            schedule,
            task,
        })
    }

    /// Parse a job definition from a file on disk.
    pub fn parse_file(path: &Path) -> Result<Self, JobParseError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| JobParseError::Io(format!("{}: {e}", path.display())))?;
        Self::parse(&contents)
    }
}
