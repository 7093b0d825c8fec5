use std::path::Path;
use std::time::Duration;

use tracing::{info, warn};

use queuectl_core::{ids, paths};

use crate::error::Result;
use crate::executor::{Executor, ShellExecutor};
use crate::job::JobState;
use crate::lifecycle::FailOutcome;
use crate::store::Store;

pub fn run_worker(data_dir: &Path) -> Result<()> {
    let mut store = Store::open(data_dir)?;
    run_worker_loop(&mut store, &ShellExecutor)
}

pub fn run_worker_loop(store: &mut Store, executor: &dyn Executor) -> Result<()> {
    let worker_id = ids::make_worker_id();
    let hostname = ids::hostname();
    let pid = std::process::id();

    info!(worker_id = %worker_id, "worker started");

    let result = poll_loop(store, executor, &worker_id, &hostname, pid);

    if let Err(err) = &result {
        warn!(worker_id = %worker_id, "worker stopping on store error: {err}");
    }
    // Best-effort final heartbeat so `status` reflects the exit.
    if let Err(err) = store.heartbeat(&worker_id, &hostname, pid) {
        warn!(worker_id = %worker_id, "final heartbeat failed: {err}");
    }
    info!(worker_id = %worker_id, "worker exiting");
    result
}

fn poll_loop(
    store: &mut Store,
    executor: &dyn Executor,
    worker_id: &str,
    hostname: &str,
    pid: u32,
) -> Result<()> {
    let stop_flag = paths::stop_flag_path(store.data_dir());

    loop {
        if stop_flag.exists() {
            info!(worker_id = %worker_id, "stop flag detected, exiting when idle");
            return Ok(());
        }

        store.heartbeat(worker_id, hostname, pid)?;

        // Re-read tunables every iteration so `config set` from a
        // concurrent CLI takes effect at the next poll.
        let poll_interval_ms = store.int_config("poll_interval_ms", 500)?;
        let lease_seconds = store.int_config("lease_seconds", 60)?;

        let Some(job) = store.claim_next(worker_id, lease_seconds)? else {
            std::thread::sleep(Duration::from_millis(poll_interval_ms.max(0) as u64));
            continue;
        };

        info!(worker_id = %worker_id, job_id = %job.id, command = %job.command, "picked job");

        match executor.run(&job.command) {
            Ok(out) if out.success() => {
                store.complete_job(&job.id)?;
                info!(worker_id = %worker_id, job_id = %job.id, "completed");
            }
            Ok(out) => {
                let outcome = store.fail_or_retry(&job, out.failure_text())?;
                log_failure(worker_id, &job.id, &outcome);
            }
            Err(err) => {
                let outcome = store.fail_or_retry(&job, &format!("{err:#}"))?;
                log_failure(worker_id, &job.id, &outcome);
            }
        }
    }
}

fn log_failure(worker_id: &str, job_id: &str, outcome: &FailOutcome) {
    if outcome.state == JobState::Dead {
        warn!(
            worker_id = %worker_id,
            job_id = %job_id,
            attempts = outcome.attempts,
            "dead-lettered"
        );
    } else {
        warn!(
            worker_id = %worker_id,
            job_id = %job_id,
            attempts = outcome.attempts,
            retry_at = outcome.next_run_at.as_deref().unwrap_or("-"),
            "attempt failed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enqueue::{EnqueueOptions, parse_payload};
    use crate::executor::ExecOutput;
    use crate::store::temp_store;

    // Pops the next scripted result per call.
    struct ScriptedExecutor {
        results: std::sync::Mutex<Vec<anyhow::Result<ExecOutput>>>,
    }

    impl ScriptedExecutor {
        fn new(mut results: Vec<anyhow::Result<ExecOutput>>) -> Self {
            results.reverse();
            Self {
                results: std::sync::Mutex::new(results),
            }
        }
    }

    impl Executor for ScriptedExecutor {
        fn run(&self, _command: &str) -> anyhow::Result<ExecOutput> {
            self.results
                .lock()
                .unwrap()
                .pop()
                .expect("executor called more times than scripted")
        }
    }

    fn quick_store() -> (tempfile::TempDir, Store) {
        let (dir, store) = temp_store();
        store.config_set("poll_interval_ms", "10").unwrap();
        (dir, store)
    }

    fn stop_after_quiescent(dir: &Path, pending_work: impl Fn() -> bool) {
        let deadline = std::time::Instant::now() + Duration::from_secs(10);
        while pending_work() {
            assert!(
                std::time::Instant::now() < deadline,
                "worker did not finish its work in time"
            );
            std::thread::sleep(Duration::from_millis(20));
        }
        std::fs::write(paths::stop_flag_path(dir), "stop").unwrap();
    }

    #[test]
    fn successful_job_completes_without_counting_attempts() {
        let (dir, store) = quick_store();
        let payload = parse_payload(r#"{"id": "t1", "command": "echo hi"}"#).unwrap();
        store.enqueue(&payload, &EnqueueOptions::default()).unwrap();
        drop(store);

        let path = dir.path().to_path_buf();
        let worker = std::thread::spawn(move || {
            let mut store = Store::open(&path).unwrap();
            let executor = ScriptedExecutor::new(vec![Ok(ExecOutput {
                exit_code: 0,
                stdout: "hi\n".into(),
                stderr: String::new(),
            })]);
            run_worker_loop(&mut store, &executor)
        });

        let probe = Store::open(dir.path()).unwrap();
        stop_after_quiescent(dir.path(), || {
            probe.get_job("t1").unwrap().unwrap().state != JobState::Completed
        });
        worker.join().unwrap().unwrap();

        let job = probe.get_job("t1").unwrap().unwrap();
        assert_eq!(job.state, JobState::Completed);
        assert_eq!(job.attempts, 0);
        assert!(job.worker_id.is_none());
        assert!(job.lease_expires_at.is_none());
    }

    #[test]
    fn executor_faults_are_recorded_not_fatal() {
        let (dir, store) = quick_store();
        store.config_set("backoff_base", "1").unwrap();
        let payload = parse_payload(
            r#"{"id": "t2", "command": "nope", "max_retries": 1}"#,
        )
        .unwrap();
        store.enqueue(&payload, &EnqueueOptions::default()).unwrap();
        drop(store);

        let path = dir.path().to_path_buf();
        let worker = std::thread::spawn(move || {
            let mut store = Store::open(&path).unwrap();
            let executor =
                ScriptedExecutor::new(vec![Err(anyhow::anyhow!("spawn refused"))]);
            run_worker_loop(&mut store, &executor)
        });

        let probe = Store::open(dir.path()).unwrap();
        stop_after_quiescent(dir.path(), || {
            probe.get_job("t2").unwrap().unwrap().state != JobState::Dead
        });
        worker.join().unwrap().unwrap();

        let job = probe.get_job("t2").unwrap().unwrap();
        assert_eq!(job.state, JobState::Dead);
        assert_eq!(job.attempts, 1);
        assert_eq!(job.last_error.as_deref(), Some("spawn refused"));
    }

    #[test]
    fn worker_heartbeats_even_when_idle() {
        let (dir, store) = quick_store();
        drop(store);

        let path = dir.path().to_path_buf();
        let worker = std::thread::spawn(move || {
            let mut store = Store::open(&path).unwrap();
            let executor = ScriptedExecutor::new(vec![]);
            run_worker_loop(&mut store, &executor)
        });

        let probe = Store::open(dir.path()).unwrap();
        stop_after_quiescent(dir.path(), || probe.list_workers().unwrap().is_empty());
        worker.join().unwrap().unwrap();

        let workers = probe.list_workers().unwrap();
        assert_eq!(workers.len(), 1);
        assert!(workers[0].id.starts_with("worker-"));
        assert_eq!(workers[0].pid, Some(std::process::id() as i64));
    }
}
