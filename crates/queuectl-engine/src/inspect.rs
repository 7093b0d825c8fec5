use std::collections::BTreeMap;

use crate::error::Result;
use crate::job::{JOB_COLUMNS, Job, JobState};
use crate::store::Store;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerRecord {
    pub id: String,
    pub started_at: String,
    pub last_heartbeat_at: String,
    pub hostname: Option<String>,
    pub pid: Option<i64>,
}

impl Store {
    /// Job counts for every state, including zeroes.
    pub fn counts_by_state(&self) -> Result<BTreeMap<JobState, i64>> {
        let mut counts: BTreeMap<JobState, i64> =
            JobState::ALL.iter().map(|s| (*s, 0)).collect();

        let mut stmt = self
            .conn()
            .prepare("SELECT state, COUNT(*) FROM jobs GROUP BY state")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;
        for row in rows {
            let (state_raw, count) = row?;
            if let Ok(state) = state_raw.parse::<JobState>() {
                counts.insert(state, count);
            }
        }
        Ok(counts)
    }

    /// All jobs in `state`, oldest first.
    pub fn list_jobs(&self, state: JobState) -> Result<Vec<Job>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs WHERE state = ?1 ORDER BY created_at ASC, id ASC"
        ))?;
        let jobs = stmt
            .query_map([state.as_str()], Job::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(jobs)
    }

    /// Dead-lettered jobs, most recently buried first.
    pub fn dlq_list(&self) -> Result<Vec<Job>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs WHERE state = ?1 ORDER BY updated_at DESC, id ASC"
        ))?;
        let jobs = stmt
            .query_map([JobState::Dead.as_str()], Job::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(jobs)
    }

    /// Known workers, most recently seen first. Rows persist across
    /// restarts; stale entries are informational.
    pub fn list_workers(&self) -> Result<Vec<WorkerRecord>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, started_at, last_heartbeat_at, hostname, pid
             FROM workers ORDER BY last_heartbeat_at DESC, id ASC",
        )?;
        let workers = stmt
            .query_map([], |row| {
                Ok(WorkerRecord {
                    id: row.get(0)?,
                    started_at: row.get(1)?,
                    last_heartbeat_at: row.get(2)?,
                    hostname: row.get(3)?,
                    pid: row.get(4)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(workers)
    }
}
