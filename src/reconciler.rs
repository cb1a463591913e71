//! Directory reconciler.
//!
//! Polls a directory of job files on a fixed interval and reconciles it
//! against the scheduler's registry: new/changed files are (re-)added,
//! disappeared files are removed. Polling, not `notify`-style filesystem
//! events, so editor rename-over-write saves and network filesystems behave
//! the same way.

use crate::event_log::{Event, EventLogWriter};
use crate::job::Job;
use crate::scheduler::Scheduler;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::interval;

#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    pub jobs_dir: PathBuf,
    pub poll_interval: Duration,
}

/// What we knew about a job file as of the last successful parse, used to
/// detect changes without re-parsing unchanged files every pass.
#[derive(Debug, Clone)]
struct FileRecord {
    job_id: String,
    modified: SystemTime,
}

/// Polls `jobs_dir` and keeps the scheduler's registry in sync with it.
pub struct Reconciler {
    config: ReconcilerConfig,
    scheduler: Arc<Scheduler>,
    event_log: EventLogWriter,
    file_index: Arc<RwLock<HashMap<PathBuf, FileRecord>>>,
    shutdown: Arc<Notify>,
    running: Arc<RwLock<bool>>,
    poll_handle: RwLock<Option<JoinHandle<()>>>,
}

impl Reconciler {
    pub fn new(config: ReconcilerConfig, scheduler: Arc<Scheduler>, event_log: EventLogWriter) -> Self {
        Self {
            config,
            scheduler,
            event_log,
            file_index: Arc::new(RwLock::new(HashMap::new())),
            shutdown: Arc::new(Notify::new()),
            running: Arc::new(RwLock::new(false)),
            poll_handle: RwLock::new(None),
        }
    }

    /// Run one full pass immediately, then start the poll loop. Idempotent.
    pub async fn start(&self) {
        self.full_pass().await;

        {
            let mut running = self.running.write();
            if *running {
                return;
            }
            *running = true;
        }

        let config = self.config.clone();
        let scheduler = self.scheduler.clone();
        let event_log = self.event_log.clone();
        let file_index = self.file_index.clone();
        let shutdown = self.shutdown.clone();
        let running_flag = self.running.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = interval(config.poll_interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if !*running_flag.read() {
                            break;
                        }
                        poll_once(&config, &scheduler, &event_log, &file_index).await;
                    }
                    _ = shutdown.notified() => {
                        tracing::info!("reconciler poll loop shutting down");
                        break;
                    }
                }
            }
        });

        *self.poll_handle.write() = Some(handle);
        tracing::info!(jobs_dir = %self.config.jobs_dir.display(), "reconciler started");
    }

    pub async fn stop(&self) {
        {
            let mut running = self.running.write();
            if !*running {
                return;
            }
            *running = false;
        }
        self.shutdown.notify_waiters();
        if let Some(handle) = self.poll_handle.write().take() {
            let _ = tokio::time::timeout(Duration::from_secs(5), handle).await;
        }
        tracing::info!("reconciler stopped");
    }

    /// Reconcile the jobs directory against the registry once, synchronously.
    pub async fn full_pass(&self) {
        poll_once(&self.config, &self.scheduler, &self.event_log, &self.file_index).await;
    }
}

fn list_job_files(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| path.extension().and_then(|ext| ext.to_str()) == Some("json"))
        .collect()
}

async fn poll_once(
    config: &ReconcilerConfig,
    scheduler: &Arc<Scheduler>,
    event_log: &EventLogWriter,
    file_index: &RwLock<HashMap<PathBuf, FileRecord>>,
) {
    let present_paths = list_job_files(&config.jobs_dir);
    let present: std::collections::HashSet<PathBuf> = present_paths.iter().cloned().collect();

    for path in &present_paths {
        let needs_load = {
            let index = file_index.read();
            match index.get(path) {
                None => true,
                Some(record) => std::fs::metadata(path)
                    .and_then(|m| m.modified())
                    .map(|modified| modified != record.modified)
                    .unwrap_or(true),
            }
        };
        if !needs_load {
            continue;
        }

        match Job::parse_file(path) {
            Ok(job) => {
                let modified = std::fs::metadata(path).and_then(|m| m.modified()).unwrap_or(SystemTime::now());
                let job_id = job.job_id.clone();

                let previous_job_id = file_index.read().get(path).map(|record| record.job_id.clone());
                if let Some(old_job_id) = previous_job_id {
                    if old_job_id != job_id {
                        scheduler.remove_job(&old_job_id);
                    }
                }

                scheduler.add_job(job);
                file_index.write().insert(path.clone(), FileRecord { job_id, modified });
            }
            Err(e) => {
                event_log.log(&Event::Error {
                    job_id: None,
                    error: &format!("failed to parse {}: {e}", path.display()),
                });
                tracing::warn!(path = %path.display(), error = %e, "skipping unparseable job file");
            }
        }
    }

    let removed: Vec<(PathBuf, String)> = {
        let index = file_index.read();
        index
            .iter()
            .filter(|(path, _)| !present.contains(*path))
            .map(|(path, record)| (path.clone(), record.job_id.clone()))
            .collect()
    };
    for (path, job_id) in removed {
        scheduler.remove_job(&job_id);
        file_index.write().remove(&path);
    }
}
