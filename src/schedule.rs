//! Schedule entries and the manager that derives them from a [`Job`].
//!
//! Mirrors the teacher's `cron_scheduler`/`cron_types` split: schedule data
//! lives here as plain enums, the `cron` crate does the arithmetic, and
//! nothing in this module owns a lock — that belongs to the scheduler core.

use crate::job::Job;
use chrono::{DateTime, NaiveDateTime, Utc};
use cron::Schedule;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ScheduleError {
    #[error("invalid cron expression `{0}`: {1}")]
    InvalidCron(String, String),
    #[error("invalid instant `{0}`: not a recognizable ISO-8601 timestamp")]
    InvalidInstant(String),
}

/// Mutable per-job scheduling state. Exclusively owned by the scheduler
/// registry; the reconciler never holds one.
#[derive(Debug, Clone)]
pub enum ScheduleEntry {
    /// Fires at most once, at `fire_at`.
    OneShot { fire_at: DateTime<Utc>, cancelled: bool },
    /// Fires every time `next_fire_at` is reached, then advances.
    Recurring {
        cron: String,
        next_fire_at: DateTime<Utc>,
        cancelled: bool,
    },
}

impl ScheduleEntry {
    pub fn should_run(&self, now: DateTime<Utc>) -> bool {
        match self {
            ScheduleEntry::OneShot { fire_at, cancelled } => !cancelled && now >= *fire_at,
            ScheduleEntry::Recurring {
                next_fire_at,
                cancelled,
                ..
            } => !cancelled && now >= *next_fire_at,
        }
    }

    pub fn cancel(&mut self) {
        match self {
            ScheduleEntry::OneShot { cancelled, .. } => *cancelled = true,
            ScheduleEntry::Recurring { cancelled, .. } => *cancelled = true,
        }
    }

    /// Advance a recurring entry's `next_fire_at` strictly forward of `from`.
    /// No-op on a one-shot (callers evict those instead).
    pub fn advance(&mut self, from: DateTime<Utc>) -> Result<(), ScheduleError> {
        if let ScheduleEntry::Recurring {
            cron,
            next_fire_at,
            ..
        } = self
        {
            let schedule = parse_cron(cron)?;
            let next = schedule
                .after(&from)
                .next()
                .ok_or_else(|| ScheduleError::InvalidCron(cron.clone(), "no further occurrences".into()))?;
            *next_fire_at = next;
        }
        Ok(())
    }
}

/// What `ScheduleManager::create_schedule_entry` decided for a job.
pub enum ScheduleOutcome {
    Scheduled(ScheduleEntry),
    /// The job is well-formed but not schedulable right now (an invalid
    /// cron expression, an unparseable instant, or a past one-shot). Carries
    /// the reason for the event log's `ERROR` line.
    Rejected(String),
}

/// Heuristic from the source system: a schedule string is an instant if it
/// contains `T` or `Z`, otherwise it's a cron expression. Cron expressions
/// containing those characters (weekday names like `Tue`, or an uppercase
/// step marker) are consequently unreachable as instants — preserved as-is,
/// flagged in DESIGN.md.
fn is_instant(schedule: &str) -> bool {
    schedule.contains('T') || schedule.contains('Z')
}

/// The `cron` crate requires a leading seconds field; standard 5-field unix
/// cron (minute hour day month weekday) does not have one, so we prepend a
/// literal `0` before handing the expression to `Schedule::from_str`.
fn parse_cron(expr: &str) -> Result<Schedule, ScheduleError> {
    let six_field = format!("0 {expr}");
    Schedule::from_str(&six_field).map_err(|e| ScheduleError::InvalidCron(expr.to_string(), e.to_string()))
}

/// A trailing `Z` is equivalent to `+00:00`; a timestamp with no offset is
/// interpreted as UTC.
fn parse_instant(s: &str) -> Result<DateTime<Utc>, ScheduleError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S"];
    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(DateTime::from_naive_utc_and_offset(naive, Utc));
        }
    }
    Err(ScheduleError::InvalidInstant(s.to_string()))
}

pub struct ScheduleManager;

impl ScheduleManager {
    /// Factory: `Job -> ScheduleEntry | rejected`. Never panics and never
    /// returns an `Err` — an unschedulable job is a `Rejected` outcome so the
    /// caller can still record the job as "known" and log the reason.
    pub fn create_schedule_entry(job: &Job, now: DateTime<Utc>) -> ScheduleOutcome {
        if is_instant(&job.schedule) {
            match parse_instant(&job.schedule) {
                Ok(fire_at) if fire_at > now => ScheduleOutcome::Scheduled(ScheduleEntry::OneShot {
                    fire_at,
                    cancelled: false,
                }),
                Ok(fire_at) => ScheduleOutcome::Rejected(format!(
                    "one-shot schedule `{}` ({fire_at}) is in the past",
                    job.schedule
                )),
                Err(e) => ScheduleOutcome::Rejected(e.to_string()),
            }
        } else {
            match parse_cron(&job.schedule) {
                Ok(schedule) => match schedule.after(&now).next() {
                    Some(next_fire_at) => ScheduleOutcome::Scheduled(ScheduleEntry::Recurring {
                        cron: job.schedule.clone(),
                        next_fire_at,
                        cancelled: false,
                    }),
                    None => ScheduleOutcome::Rejected(format!(
                        "cron expression `{}` has no upcoming occurrences",
                        job.schedule
                    )),
                },
                Err(e) => ScheduleOutcome::Rejected(e.to_string()),
            }
        }
    }
}
