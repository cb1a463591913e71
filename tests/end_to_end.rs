//! End-to-end scenarios: a jobs directory on disk, reconciled and scheduled
//! by real `Scheduler`/`Reconciler` instances writing to real log files.

use chronoflow::{EventLogWriter, ExecLogWriter, Reconciler, ReconcilerConfig, Scheduler, SchedulerConfig};
use chrono::Utc;
use std::fs;
use std::sync::Arc;
use std::time::Duration;

fn start_system(jobs_dir: &std::path::Path, log_dir: &std::path::Path) -> (Arc<Scheduler>, Reconciler) {
    let scheduler = Arc::new(Scheduler::new(
        SchedulerConfig {
            tick_interval: Duration::from_millis(50),
            max_concurrent_jobs: 4,
            job_timeout: Duration::from_secs(5),
            shutdown_join_timeout: Duration::from_secs(2),
        },
        ExecLogWriter::new(log_dir),
        EventLogWriter::new(log_dir),
    ));
    let reconciler = Reconciler::new(
        ReconcilerConfig {
            jobs_dir: jobs_dir.to_path_buf(),
            poll_interval: Duration::from_millis(50),
        },
        scheduler.clone(),
        EventLogWriter::new(log_dir),
    );
    (scheduler, reconciler)
}

fn write_job(dir: &std::path::Path, file_name: &str, job_id: &str, schedule: &str, command: &str) {
    fs::write(
        dir.join(file_name),
        format!(
            r#"{{"job_id":"{job_id}","description":"","schedule":"{schedule}","task":{{"type":"execute_command","command":"{command}"}}}}"#
        ),
    )
    .unwrap();
}

/// Spec S1: a `* * * * *` job must produce a `SUCCESS` execution log with
/// `stdout: hi\n` within 65s of being loaded. Cron granularity is minutes, so
/// this polls for the log file rather than sleeping a fixed amount, but is
/// still bounded by the spec's own 65s budget.
#[tokio::test]
async fn cron_job_fires_repeatedly_and_logs_each_execution() {
    let jobs_dir = tempfile::tempdir().unwrap();
    let log_dir = tempfile::tempdir().unwrap();
    write_job(jobs_dir.path(), "recurring.json", "tick", "* * * * *", "echo hi");

    let (scheduler, reconciler) = start_system(jobs_dir.path(), log_dir.path());
    reconciler.start().await;
    scheduler.start();

    assert!(scheduler.has_entry("tick"));

    let job_log_dir = log_dir.path().join("tick");
    let deadline = tokio::time::Instant::now() + Duration::from_secs(65);
    let exec_file = loop {
        if let Ok(mut entries) = fs::read_dir(&job_log_dir) {
            if let Some(entry) = entries.next() {
                break entry.unwrap().path();
            }
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "no execution log appeared under {} within 65s",
            job_log_dir.display()
        );
        tokio::time::sleep(Duration::from_millis(200)).await;
    };

    reconciler.stop().await;
    scheduler.stop().await;

    assert!(scheduler.has_entry("tick"), "a recurring entry must survive its own fire");

    let contents = fs::read_to_string(&exec_file).unwrap();
    assert!(contents.contains("status: SUCCESS"));
    assert!(contents.contains("exit_code: 0"));
    assert!(contents.contains("stdout:\nhi\n"));
}

#[tokio::test]
async fn one_shot_job_fires_once_then_is_evicted_from_schedule() {
    let jobs_dir = tempfile::tempdir().unwrap();
    let log_dir = tempfile::tempdir().unwrap();
    let fire_at = Utc::now() + chrono::Duration::milliseconds(150);
    write_job(jobs_dir.path(), "once.json", "greet", &fire_at.to_rfc3339(), "echo hello");

    let (scheduler, reconciler) = start_system(jobs_dir.path(), log_dir.path());
    reconciler.start().await;
    scheduler.start();

    tokio::time::sleep(Duration::from_secs(2)).await;

    reconciler.stop().await;
    scheduler.stop().await;

    assert!(scheduler.has_job("greet"));
    assert!(!scheduler.has_entry("greet"));

    let execs: Vec<_> = fs::read_dir(log_dir.path().join("greet")).unwrap().collect();
    assert_eq!(execs.len(), 1);
}

#[tokio::test]
async fn past_one_shot_is_rejected_and_recorded_as_an_error_event() {
    let jobs_dir = tempfile::tempdir().unwrap();
    let log_dir = tempfile::tempdir().unwrap();
    write_job(jobs_dir.path(), "stale.json", "old", "2000-01-01T00:00:00Z", "echo too late");

    let (scheduler, reconciler) = start_system(jobs_dir.path(), log_dir.path());
    reconciler.full_pass().await;

    assert!(scheduler.has_job("old"));
    assert!(!scheduler.has_entry("old"));

    let contents = fs::read_to_string(log_dir.path().join("scheduler.log")).unwrap();
    assert!(contents.contains("ERROR") && contents.contains("old"));
}

#[tokio::test]
async fn failing_command_is_logged_as_a_failure_without_crashing_the_scheduler() {
    let jobs_dir = tempfile::tempdir().unwrap();
    let log_dir = tempfile::tempdir().unwrap();
    let fire_at = Utc::now() + chrono::Duration::milliseconds(150);
    write_job(jobs_dir.path(), "bad.json", "broken", &fire_at.to_rfc3339(), "exit 3");

    let (scheduler, reconciler) = start_system(jobs_dir.path(), log_dir.path());
    reconciler.start().await;
    scheduler.start();

    tokio::time::sleep(Duration::from_secs(2)).await;
    reconciler.stop().await;
    scheduler.stop().await;

    let entry = fs::read_dir(log_dir.path().join("broken")).unwrap().next().unwrap().unwrap();
    let contents = fs::read_to_string(entry.path()).unwrap();
    assert!(contents.contains("status: FAILURE"));
    assert!(contents.contains("exit_code: 3"));
}

#[tokio::test]
async fn deleting_the_job_file_removes_it_from_the_registry() {
    let jobs_dir = tempfile::tempdir().unwrap();
    let log_dir = tempfile::tempdir().unwrap();
    write_job(jobs_dir.path(), "to_delete.json", "ephemeral", "* * * * *", "echo hi");

    let (scheduler, reconciler) = start_system(jobs_dir.path(), log_dir.path());
    reconciler.full_pass().await;
    assert!(scheduler.has_job("ephemeral"));

    fs::remove_file(jobs_dir.path().join("to_delete.json")).unwrap();
    reconciler.full_pass().await;

    assert!(!scheduler.has_job("ephemeral"));
    let contents = fs::read_to_string(log_dir.path().join("scheduler.log")).unwrap();
    assert!(contents.contains("DELETE job_id=ephemeral"));
}

#[tokio::test]
async fn editing_a_jobs_schedule_is_logged_as_schedule_change_not_update() {
    let jobs_dir = tempfile::tempdir().unwrap();
    let log_dir = tempfile::tempdir().unwrap();
    write_job(jobs_dir.path(), "evolving.json", "evolving", "* * * * *", "echo hi");

    let (scheduler, reconciler) = start_system(jobs_dir.path(), log_dir.path());
    reconciler.full_pass().await;

    // Ensure the filesystem mtime actually advances between writes.
    tokio::time::sleep(Duration::from_millis(20)).await;
    write_job(jobs_dir.path(), "evolving.json", "evolving", "*/5 * * * *", "echo hi");
    reconciler.full_pass().await;

    let contents = fs::read_to_string(log_dir.path().join("scheduler.log")).unwrap();
    assert!(contents.contains("SCHEDULE_CHANGE job_id=evolving"));
    let _ = scheduler;
}
