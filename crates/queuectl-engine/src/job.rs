use std::fmt;
use std::str::FromStr;

use rusqlite::Row;
use rusqlite::types::Type;

use crate::error::QueueError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum JobState {
    Pending,
    Processing,
    Completed,
    Failed,
    Dead,
}

impl JobState {
    pub const ALL: [JobState; 5] = [
        JobState::Pending,
        JobState::Processing,
        JobState::Completed,
        JobState::Failed,
        JobState::Dead,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            JobState::Pending => "pending",
            JobState::Processing => "processing",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
            JobState::Dead => "dead",
        }
    }

    /// Terminal states are never selected by the claim query.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Completed | JobState::Dead)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobState {
    type Err = QueueError;

    fn from_str(raw: &str) -> Result<Self, QueueError> {
        match raw {
            "pending" => Ok(JobState::Pending),
            "processing" => Ok(JobState::Processing),
            "completed" => Ok(JobState::Completed),
            "failed" => Ok(JobState::Failed),
            "dead" => Ok(JobState::Dead),
            other => Err(QueueError::BadState(other.to_string())),
        }
    }
}

// Column list matching Job::from_row; keep the two in sync.
pub(crate) const JOB_COLUMNS: &str = "id, command, state, attempts, max_retries, priority, \
     created_at, updated_at, next_run_at, last_error, worker_id, lease_expires_at";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub id: String,
    pub command: String,
    pub state: JobState,
    pub attempts: i64,
    pub max_retries: i64,
    pub priority: i64,
    pub created_at: String,
    pub updated_at: String,
    pub next_run_at: Option<String>,
    pub last_error: Option<String>,
    pub worker_id: Option<String>,
    pub lease_expires_at: Option<String>,
}

impl Job {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Job> {
        let state_raw: String = row.get("state")?;
        let state = state_raw.parse::<JobState>().map_err(|_| {
            rusqlite::Error::FromSqlConversionFailure(
                2,
                Type::Text,
                format!("unknown job state {state_raw:?}").into(),
            )
        })?;

        Ok(Job {
            id: row.get("id")?,
            command: row.get("command")?,
            state,
            attempts: row.get("attempts")?,
            max_retries: row.get("max_retries")?,
            priority: row.get("priority")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
            next_run_at: row.get("next_run_at")?,
            last_error: row.get("last_error")?,
            worker_id: row.get("worker_id")?,
            lease_expires_at: row.get("lease_expires_at")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn states_round_trip_through_text() {
        for state in JobState::ALL {
            assert_eq!(state.as_str().parse::<JobState>().unwrap(), state);
        }
    }

    #[test]
    fn unknown_state_is_rejected() {
        let err = "paused".parse::<JobState>().unwrap_err();
        assert!(matches!(err, QueueError::BadState(s) if s == "paused"));
    }

    #[test]
    fn only_completed_and_dead_are_terminal() {
        assert!(JobState::Completed.is_terminal());
        assert!(JobState::Dead.is_terminal());
        assert!(!JobState::Pending.is_terminal());
        assert!(!JobState::Processing.is_terminal());
        assert!(!JobState::Failed.is_terminal());
    }
}
