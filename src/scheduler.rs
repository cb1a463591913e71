//! Scheduler core.
//!
//! Owns the registry `{job_id -> Job}` and `{job_id -> ScheduleEntry}`, runs
//! the tick loop, and dispatches due entries to a bounded worker pool. Follows
//! the same `Notify`-based shutdown pattern as the teacher's `CronScheduler`.

use crate::event_log::{Event, EventLogWriter};
use crate::exec_log::{ExecLogWriter, ExecutionRecord};
use crate::executor::TaskExecutor;
use crate::job::Job;
use crate::schedule::{ScheduleEntry, ScheduleManager, ScheduleOutcome};
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::interval;

/// The registry is the only shared mutable state: one lock, short
/// acquisitions, never held across subprocess or filesystem I/O.
#[derive(Default)]
struct Registry {
    jobs: HashMap<String, Job>,
    entries: HashMap<String, ScheduleEntry>,
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// How often the tick loop checks for due entries.
    pub tick_interval: Duration,
    /// Global cap on concurrent executions.
    pub max_concurrent_jobs: usize,
    /// Wall-clock timeout applied to each subprocess.
    pub job_timeout: Duration,
    /// How long `stop()` waits for the tick loop to join.
    pub shutdown_join_timeout: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(1),
            max_concurrent_jobs: 50,
            job_timeout: Duration::from_secs(3600),
            shutdown_join_timeout: Duration::from_secs(5),
        }
    }
}

/// The scheduler core: registry + tick loop + worker dispatch.
pub struct Scheduler {
    registry: Arc<RwLock<Registry>>,
    executor: TaskExecutor,
    exec_log: ExecLogWriter,
    event_log: EventLogWriter,
    config: SchedulerConfig,
    semaphore: Arc<Semaphore>,
    shutdown: Arc<Notify>,
    running: Arc<RwLock<bool>>,
    tick_handle: RwLock<Option<JoinHandle<()>>>,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig, exec_log: ExecLogWriter, event_log: EventLogWriter) -> Self {
        Self {
            registry: Arc::new(RwLock::new(Registry::default())),
            executor: TaskExecutor::new(config.job_timeout),
            exec_log,
            event_log,
            semaphore: Arc::new(Semaphore::new(config.max_concurrent_jobs.max(1))),
            shutdown: Arc::new(Notify::new()),
            running: Arc::new(RwLock::new(false)),
            tick_handle: RwLock::new(None),
            config,
        }
    }

    /// Upsert a job into the registry. New jobs emit `ADD`; existing jobs
    /// emit `UPDATE` or, when the raw `schedule` string differs from the
    /// previous one, `SCHEDULE_CHANGE` instead.
    pub fn add_job(&self, job: Job) {
        let now = Utc::now();
        let job_id = job.job_id.clone();
        let new_schedule = job.schedule.clone();
        let outcome = ScheduleManager::create_schedule_entry(&job, now);

        let previous_job;
        {
            let mut registry = self.registry.write();
            if let Some(entry) = registry.entries.get_mut(&job_id) {
                entry.cancel();
            }
            registry.entries.remove(&job_id);
            previous_job = registry.jobs.insert(job_id.clone(), job);
            if let ScheduleOutcome::Scheduled(entry) = &outcome {
                registry.entries.insert(job_id.clone(), entry.clone());
            }
        }

        if let ScheduleOutcome::Rejected(reason) = &outcome {
            self.event_log.log(&Event::Error {
                job_id: Some(&job_id),
                error: reason,
            });
        }

        match previous_job {
            None => {
                self.event_log.log(&Event::Add { job_id: &job_id });
                tracing::info!(job_id = %job_id, "job added");
            }
            Some(old) if old.schedule != new_schedule => {
                self.event_log.log(&Event::ScheduleChange {
                    job_id: &job_id,
                    old_schedule: &old.schedule,
                    new_schedule: &new_schedule,
                });
                tracing::info!(job_id = %job_id, old = %old.schedule, new = %new_schedule, "job schedule changed");
            }
            Some(_) => {
                self.event_log.log(&Event::Update { job_id: &job_id });
                tracing::info!(job_id = %job_id, "job updated");
            }
        }
    }

    /// Remove a job. Cancels its entry first so any concurrent tick observes
    /// the cancellation. Removing an unknown id is a no-op on the registry
    /// but still emits `DELETE` — preserved from the source system.
    pub fn remove_job(&self, job_id: &str) {
        {
            let mut registry = self.registry.write();
            if let Some(entry) = registry.entries.get_mut(job_id) {
                entry.cancel();
            }
            registry.entries.remove(job_id);
            registry.jobs.remove(job_id);
        }
        self.event_log.log(&Event::Delete { job_id });
        tracing::info!(job_id, "job removed");
    }

    /// Whether a job_id is currently known to the registry.
    pub fn has_job(&self, job_id: &str) -> bool {
        self.registry.read().jobs.contains_key(job_id)
    }

    /// Whether a job_id currently has a live schedule entry.
    pub fn has_entry(&self, job_id: &str) -> bool {
        self.registry.read().entries.contains_key(job_id)
    }

    /// Start the tick loop. Idempotent.
    pub fn start(&self) {
        {
            let mut running = self.running.write();
            if *running {
                tracing::warn!("scheduler already running");
                return;
            }
            *running = true;
        }

        let registry = self.registry.clone();
        let executor = self.executor;
        let exec_log = self.exec_log.clone();
        let event_log = self.event_log.clone();
        let semaphore = self.semaphore.clone();
        let shutdown = self.shutdown.clone();
        let running_flag = self.running.clone();
        let tick_interval = self.config.tick_interval;

        let handle = tokio::spawn(async move {
            let mut ticker = interval(tick_interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if !*running_flag.read() {
                            break;
                        }
                        tick(&registry, executor, &exec_log, &event_log, &semaphore).await;
                    }
                    _ = shutdown.notified() => {
                        tracing::info!("scheduler tick loop shutting down");
                        break;
                    }
                }
            }
        });

        *self.tick_handle.write() = Some(handle);
        self.event_log.log(&Event::Start);
        tracing::info!("scheduler started");
    }

    /// Stop the tick loop, waiting up to `shutdown_join_timeout` for it to
    /// join. In-flight executions are not cancelled.
    pub async fn stop(&self) {
        {
            let mut running = self.running.write();
            if !*running {
                return;
            }
            *running = false;
        }
        self.shutdown.notify_waiters();

        let handle = self.tick_handle.write().take();
        if let Some(handle) = handle {
            let _ = tokio::time::timeout(self.config.shutdown_join_timeout, handle).await;
        }

        self.event_log.log(&Event::Stop);
        tracing::info!("scheduler stopped");
    }
}

async fn tick(
    registry: &Arc<RwLock<Registry>>,
    executor: TaskExecutor,
    exec_log: &ExecLogWriter,
    event_log: &EventLogWriter,
    semaphore: &Arc<Semaphore>,
) {
    let now = Utc::now();

    // Snapshot due entries under the lock, then release it — dispatch must
    // never happen while holding the registry lock.
    let due: Vec<(String, Job)> = {
        let registry = registry.read();
        registry
            .entries
            .iter()
            .filter(|(_, entry)| entry.should_run(now))
            .filter_map(|(job_id, _)| registry.jobs.get(job_id).map(|job| (job_id.clone(), job.clone())))
            .collect()
    };

    for (job_id, job) in &due {
        let permit = match semaphore.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => continue, // semaphore closed: scheduler is shutting down
        };

        let executor = executor;
        let exec_log = exec_log.clone();
        let event_log = event_log.clone();
        let job_id = job_id.clone();
        let job = job.clone();

        tokio::spawn(async move {
            let _permit = permit;
            run_one(job_id, job, executor, exec_log, event_log).await;
        });
    }

    // Re-acquire the lock to advance recurring entries or evict fired
    // one-shots. A job removed concurrently simply won't be found here.
    let mut registry = registry.write();
    for (job_id, _) in &due {
        let mut advance_error = None;
        let mut should_evict = false;
        if let Some(entry) = registry.entries.get_mut(job_id) {
            match entry {
                ScheduleEntry::Recurring { .. } => {
                    if let Err(e) = entry.advance(now) {
                        advance_error = Some(e.to_string());
                    }
                }
                ScheduleEntry::OneShot { .. } => should_evict = true,
            }
        }
        if should_evict {
            registry.entries.remove(job_id);
        }
        if let Some(err) = advance_error {
            event_log.log(&Event::Error {
                job_id: Some(job_id),
                error: &err,
            });
        }
    }
}

async fn run_one(
    job_id: String,
    job: Job,
    executor: TaskExecutor,
    exec_log: ExecLogWriter,
    event_log: EventLogWriter,
) {
    let command = job.task.command().to_string();
    let execution_id = ExecLogWriter::new_execution_id();
    let start_time = Utc::now();
    tracing::debug!(job_id = %job_id, execution_id = %execution_id, "executing job");

    let outcome = executor.execute(&job.task).await;
    let end_time = Utc::now();
    let status = if outcome.success { "SUCCESS" } else { "FAILURE" };

    let record = ExecutionRecord {
        execution_id: &execution_id,
        job_id: &job_id,
        command: &command,
        start_time,
        end_time,
        status,
        exit_code: outcome.exit_code,
        stdout: &outcome.stdout,
        stderr: &outcome.stderr,
    };

    if let Err(e) = exec_log.write(&record) {
        event_log.log(&Event::Error {
            job_id: Some(&job_id),
            error: &format!("failed to write execution log: {e}"),
        });
    }

    tracing::info!(job_id = %job_id, execution_id = %execution_id, status, "job execution completed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::Task;
    use std::time::Duration as StdDuration;

    fn test_job(job_id: &str, schedule: &str, command: &str) -> Job {
        Job {
            job_id: job_id.to_string(),
            description: String::new(),
            schedule: schedule.to_string(),
            task: Task::ExecuteCommand {
                command: command.to_string(),
            },
        }
    }

    fn scheduler_with(dir: &std::path::Path) -> Scheduler {
        Scheduler::new(
            SchedulerConfig {
                tick_interval: Duration::from_millis(50),
                max_concurrent_jobs: 4,
                job_timeout: Duration::from_secs(5),
                shutdown_join_timeout: Duration::from_secs(2),
            },
            ExecLogWriter::new(dir),
            EventLogWriter::new(dir),
        )
    }

    #[tokio::test]
    async fn add_job_installs_an_entry() {
        let dir = tempfile::tempdir().unwrap();
        let scheduler = scheduler_with(dir.path());
        scheduler.add_job(test_job("r1", "* * * * *", "echo hi"));
        assert!(scheduler.has_job("r1"));
        assert!(scheduler.has_entry("r1"));
    }

    #[tokio::test]
    async fn past_one_shot_is_known_but_has_no_entry() {
        let dir = tempfile::tempdir().unwrap();
        let scheduler = scheduler_with(dir.path());
        scheduler.add_job(test_job("o1", "2000-01-01T00:00:00Z", "echo hi"));
        assert!(scheduler.has_job("o1"));
        assert!(!scheduler.has_entry("o1"));
    }

    #[tokio::test]
    async fn remove_unknown_job_is_a_no_op_but_still_logs_delete() {
        let dir = tempfile::tempdir().unwrap();
        let scheduler = scheduler_with(dir.path());
        scheduler.remove_job("ghost");
        let contents = std::fs::read_to_string(dir.path().join("scheduler.log")).unwrap();
        assert!(contents.contains("DELETE job_id=ghost"));
    }

    #[tokio::test]
    async fn schedule_change_is_logged_distinctly_from_update() {
        let dir = tempfile::tempdir().unwrap();
        let scheduler = scheduler_with(dir.path());
        scheduler.add_job(test_job("j1", "* * * * *", "echo hi"));
        scheduler.add_job(test_job("j1", "*/5 * * * *", "echo hi"));
        let contents = std::fs::read_to_string(dir.path().join("scheduler.log")).unwrap();
        assert!(contents.contains("SCHEDULE_CHANGE"));
        assert!(!contents.contains("] UPDATE job_id=j1"));
    }

    #[tokio::test]
    async fn same_schedule_update_is_logged_as_update() {
        let dir = tempfile::tempdir().unwrap();
        let scheduler = scheduler_with(dir.path());
        scheduler.add_job(test_job("j1", "* * * * *", "echo hi"));
        scheduler.add_job(test_job("j1", "* * * * *", "echo bye"));
        let contents = std::fs::read_to_string(dir.path().join("scheduler.log")).unwrap();
        assert!(contents.contains("UPDATE job_id=j1"));
        assert!(!contents.contains("SCHEDULE_CHANGE"));
    }

    #[tokio::test]
    async fn one_shot_fires_once_and_evicts() {
        let dir = tempfile::tempdir().unwrap();
        let scheduler = scheduler_with(dir.path());
        let fire_at = Utc::now() + chrono::Duration::milliseconds(100);
        scheduler.add_job(test_job("once", &fire_at.to_rfc3339(), "echo fired"));
        scheduler.start();

        tokio::time::sleep(StdDuration::from_secs(2)).await;
        scheduler.stop().await;

        assert!(!scheduler.has_entry("once"));
        assert!(scheduler.has_job("once"));
        let log_dir = dir.path().join("once");
        let entries: Vec<_> = std::fs::read_dir(&log_dir).unwrap().collect();
        assert_eq!(entries.len(), 1, "expected exactly one execution log");
    }

    #[tokio::test]
    async fn failed_command_is_recorded_as_failure_and_scheduler_keeps_running() {
        let dir = tempfile::tempdir().unwrap();
        let scheduler = scheduler_with(dir.path());
        let fire_at = Utc::now() + chrono::Duration::milliseconds(100);
        scheduler.add_job(test_job("bad", &fire_at.to_rfc3339(), "false"));
        scheduler.start();

        tokio::time::sleep(StdDuration::from_secs(2)).await;
        scheduler.stop().await;

        let log_dir = dir.path().join("bad");
        let entry = std::fs::read_dir(&log_dir).unwrap().next().unwrap().unwrap();
        let contents = std::fs::read_to_string(entry.path()).unwrap();
        assert!(contents.contains("status: FAILURE"));
        assert!(contents.contains("exit_code: 1"));
    }
}
