use rusqlite::{OptionalExtension, params};

use queuectl_core::time;

use crate::error::Result;
use crate::job::{JOB_COLUMNS, Job, JobState};
use crate::store::Store;

// Runnable pending/failed work, or processing rows whose lease has lapsed
// (the owning worker is presumed dead).
const ELIGIBLE: &str = "\
    (state IN ('pending', 'failed') AND (next_run_at IS NULL OR next_run_at <= ?1))
    OR (state = 'processing' AND (lease_expires_at IS NULL OR lease_expires_at <= ?1))";

impl Store {
    pub fn claim_next(&mut self, worker_id: &str, lease_seconds: i64) -> Result<Option<Job>> {
        let now = time::now();
        let now_ts = time::format_ts(now);
        let lease_expires_at = time::format_ts(time::plus_seconds(now, lease_seconds));

        let tx = self.immediate_tx()?;

        let picked: Option<String> = tx
            .query_row(
                &format!(
                    "SELECT id FROM jobs
                     WHERE {ELIGIBLE}
                     ORDER BY priority ASC, created_at ASC, id ASC
                     LIMIT 1"
                ),
                params![now_ts],
                |row| row.get(0),
            )
            .optional()?;

        let Some(job_id) = picked else {
            tx.commit()?;
            return Ok(None);
        };

        // BEGIN IMMEDIATE already serializes writers; re-asserting the
        // predicate keeps the claim correct under any finer-grained write
        // lock. Zero rows affected means a lost race, reported as None.
        let updated = tx.execute(
            &format!(
                "UPDATE jobs
                 SET state = ?2, worker_id = ?3, lease_expires_at = ?4, updated_at = ?1
                 WHERE id = ?5 AND ({ELIGIBLE})"
            ),
            params![
                now_ts,
                JobState::Processing.as_str(),
                worker_id,
                lease_expires_at,
                job_id
            ],
        )?;
        if updated != 1 {
            tx.commit()?;
            return Ok(None);
        }

        let job = tx.query_row(
            &format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = ?1"),
            params![job_id],
            Job::from_row,
        )?;
        tx.commit()?;
        Ok(Some(job))
    }
}
