use rusqlite::{OptionalExtension, params};

use queuectl_core::time;

use crate::error::{QueueError, Result};
use crate::job::{JOB_COLUMNS, Job, JobState};
use crate::store::Store;

pub const LAST_ERROR_MAX_CHARS: usize = 4000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailOutcome {
    pub state: JobState,
    pub attempts: i64,
    pub next_run_at: Option<String>,
}

impl Store {
    pub fn complete_job(&self, job_id: &str) -> Result<()> {
        let now_ts = time::now_ts();
        // attempts, next_run_at and last_error stay as they were.
        let updated = self.conn().execute(
            "UPDATE jobs
             SET state = ?1, updated_at = ?2, worker_id = NULL, lease_expires_at = NULL
             WHERE id = ?3",
            params![JobState::Completed.as_str(), now_ts, job_id],
        )?;
        if updated == 0 {
            return Err(QueueError::NoSuchJob(job_id.to_string()));
        }
        Ok(())
    }

    pub fn fail_or_retry(&self, job: &Job, error_text: &str) -> Result<FailOutcome> {
        let attempts = job.attempts + 1;
        let backoff_base = self.int_config("backoff_base", 2)?;
        let max_backoff_seconds = self.int_config("max_backoff_seconds", 300)?;
        let delay_seconds = backoff_delay_seconds(backoff_base, attempts, max_backoff_seconds);

        // One now per transition; every written timestamp derives from it.
        let now = time::now();
        let now_ts = time::format_ts(now);
        let error_text = normalize_error(error_text);

        let (state, next_run_at) = if attempts >= job.max_retries {
            (JobState::Dead, None)
        } else {
            (
                JobState::Failed,
                Some(time::format_ts(time::plus_seconds(now, delay_seconds))),
            )
        };

        let updated = self.conn().execute(
            "UPDATE jobs
             SET state = ?1, attempts = ?2, next_run_at = ?3, last_error = ?4,
                 updated_at = ?5, worker_id = NULL, lease_expires_at = NULL
             WHERE id = ?6",
            params![state.as_str(), attempts, next_run_at, error_text, now_ts, job.id],
        )?;
        if updated == 0 {
            return Err(QueueError::NoSuchJob(job.id.clone()));
        }

        Ok(FailOutcome {
            state,
            attempts,
            next_run_at,
        })
    }

    pub fn heartbeat(&self, worker_id: &str, hostname: &str, pid: u32) -> Result<()> {
        let now_ts = time::now_ts();
        self.conn().execute(
            "INSERT INTO workers (id, started_at, last_heartbeat_at, hostname, pid)
             VALUES (?1, ?2, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET last_heartbeat_at = excluded.last_heartbeat_at",
            params![worker_id, now_ts, hostname, pid],
        )?;
        Ok(())
    }

    pub fn dlq_retry(&mut self, job_id: &str) -> Result<Job> {
        let now_ts = time::now_ts();
        let tx = self.immediate_tx()?;

        let updated = tx.execute(
            "UPDATE jobs
             SET state = ?1, attempts = 0, next_run_at = ?2, last_error = NULL,
                 updated_at = ?2, worker_id = NULL, lease_expires_at = NULL
             WHERE id = ?3 AND state = ?4",
            params![
                JobState::Pending.as_str(),
                now_ts,
                job_id,
                JobState::Dead.as_str()
            ],
        )?;
        if updated == 0 {
            let exists: Option<String> = tx
                .query_row("SELECT state FROM jobs WHERE id = ?1", [job_id], |row| {
                    row.get(0)
                })
                .optional()?;
            tx.commit()?;
            return Err(match exists {
                Some(_) => QueueError::NotDead(job_id.to_string()),
                None => QueueError::NoSuchJob(job_id.to_string()),
            });
        }

        let job = tx.query_row(
            &format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = ?1"),
            [job_id],
            Job::from_row,
        )?;
        tx.commit()?;
        Ok(job)
    }
}

// min(base ^ attempts, cap) in whole seconds, saturating on overflow.
fn backoff_delay_seconds(base: i64, attempts: i64, cap: i64) -> i64 {
    let exp = u32::try_from(attempts).unwrap_or(u32::MAX);
    match base.checked_pow(exp) {
        Some(delay) => delay.min(cap),
        None => cap,
    }
}

fn normalize_error(raw: &str) -> String {
    let trimmed = raw.trim();
    let text = if trimmed.is_empty() {
        "Command failed (no output)"
    } else {
        trimmed
    };
    text.chars().take(LAST_ERROR_MAX_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enqueue::{EnqueueOptions, parse_payload};
    use crate::store::temp_store;

    fn enqueue_and_claim(store: &mut Store, id: &str, max_retries: i64) -> Job {
        let payload = parse_payload(&format!(
            r#"{{"id": "{id}", "command": "false", "max_retries": {max_retries}}}"#
        ))
        .unwrap();
        store.enqueue(&payload, &EnqueueOptions::default()).unwrap();
        store.claim_next("w1", 60).unwrap().unwrap()
    }

    #[test]
    fn complete_releases_the_lease_and_leaves_attempts_alone() {
        let (_dir, mut store) = temp_store();
        let job = enqueue_and_claim(&mut store, "ok", 3);
        store.complete_job(&job.id).unwrap();

        let done = store.get_job("ok").unwrap().unwrap();
        assert_eq!(done.state, JobState::Completed);
        assert_eq!(done.attempts, 0);
        assert!(done.worker_id.is_none());
        assert!(done.lease_expires_at.is_none());
        assert!(done.last_error.is_none());
    }

    #[test]
    fn complete_on_missing_job_fails() {
        let (_dir, store) = temp_store();
        assert!(matches!(
            store.complete_job("ghost"),
            Err(QueueError::NoSuchJob(_))
        ));
    }

    #[test]
    fn first_failure_schedules_a_backoff_retry() {
        let (_dir, mut store) = temp_store();
        let job = enqueue_and_claim(&mut store, "flaky", 3);

        let outcome = store.fail_or_retry(&job, "boom").unwrap();
        assert_eq!(outcome.state, JobState::Failed);
        assert_eq!(outcome.attempts, 1);

        let row = store.get_job("flaky").unwrap().unwrap();
        assert_eq!(row.state, JobState::Failed);
        assert_eq!(row.attempts, 1);
        assert_eq!(row.last_error.as_deref(), Some("boom"));
        assert!(row.worker_id.is_none());
        assert!(row.lease_expires_at.is_none());

        // Backoff bound: next_run_at - updated_at == min(base^attempts, cap).
        let updated = queuectl_core::time::parse_ts(&row.updated_at).unwrap();
        let next = queuectl_core::time::parse_ts(row.next_run_at.as_deref().unwrap()).unwrap();
        assert_eq!((next - updated).num_seconds(), 2);
    }

    #[test]
    fn backoff_grows_per_attempt_and_is_capped() {
        assert_eq!(backoff_delay_seconds(2, 1, 300), 2);
        assert_eq!(backoff_delay_seconds(2, 3, 300), 8);
        assert_eq!(backoff_delay_seconds(2, 20, 300), 300);
        assert_eq!(backoff_delay_seconds(1, 5, 10), 1);
        assert_eq!(backoff_delay_seconds(2, 5000, 300), 300);
    }

    #[test]
    fn exhausted_retries_dead_letter_the_job() {
        let (_dir, mut store) = temp_store();
        let job = enqueue_and_claim(&mut store, "doomed", 2);

        let first = store.fail_or_retry(&job, "err 1").unwrap();
        assert_eq!(first.state, JobState::Failed);

        // Second attempt reaches max_retries.
        let job = store.get_job("doomed").unwrap().unwrap();
        let second = store.fail_or_retry(&job, "err 2").unwrap();
        assert_eq!(second.state, JobState::Dead);
        assert_eq!(second.attempts, 2);
        assert!(second.next_run_at.is_none());

        let row = store.get_job("doomed").unwrap().unwrap();
        assert_eq!(row.state, JobState::Dead);
        assert!(row.next_run_at.is_none());
        assert_eq!(row.last_error.as_deref(), Some("err 2"));
    }

    #[test]
    fn error_text_falls_back_and_is_truncated() {
        assert_eq!(normalize_error("  "), "Command failed (no output)");
        assert_eq!(normalize_error(" tail \n"), "tail");
        let long = "x".repeat(LAST_ERROR_MAX_CHARS + 100);
        assert_eq!(normalize_error(&long).chars().count(), LAST_ERROR_MAX_CHARS);
    }

    #[test]
    fn heartbeat_preserves_started_at() {
        let (_dir, store) = temp_store();
        store.heartbeat("w1", "host", 42).unwrap();
        let started: String = store
            .conn()
            .query_row("SELECT started_at FROM workers WHERE id = 'w1'", [], |r| {
                r.get(0)
            })
            .unwrap();

        store.heartbeat("w1", "host", 42).unwrap();
        let (started_again, beat): (String, String) = store
            .conn()
            .query_row(
                "SELECT started_at, last_heartbeat_at FROM workers WHERE id = 'w1'",
                [],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .unwrap();
        assert_eq!(started, started_again);
        assert!(beat >= started);
    }

    #[test]
    fn dlq_retry_resets_the_job() {
        let (_dir, mut store) = temp_store();
        let job = enqueue_and_claim(&mut store, "d1", 1);
        let outcome = store.fail_or_retry(&job, "fatal").unwrap();
        assert_eq!(outcome.state, JobState::Dead);

        let job = store.dlq_retry("d1").unwrap();
        assert_eq!(job.state, JobState::Pending);
        assert_eq!(job.attempts, 0);
        assert!(job.last_error.is_none());
        assert!(job.next_run_at.is_some());

        // Eligible again right away.
        let reclaimed = store.claim_next("w2", 60).unwrap().unwrap();
        assert_eq!(reclaimed.id, "d1");
    }

    #[test]
    fn dlq_retry_rejects_non_dead_jobs() {
        let (_dir, mut store) = temp_store();
        let payload = parse_payload(r#"{"id": "alive", "command": "true"}"#).unwrap();
        store.enqueue(&payload, &EnqueueOptions::default()).unwrap();

        assert!(matches!(
            store.dlq_retry("alive"),
            Err(QueueError::NotDead(id)) if id == "alive"
        ));
        assert!(matches!(
            store.dlq_retry("missing"),
            Err(QueueError::NoSuchJob(id)) if id == "missing"
        ));
    }
}
