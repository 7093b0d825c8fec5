use rusqlite::params;
use serde::Deserialize;

use queuectl_core::time;

use crate::error::{QueueError, Result};
use crate::job::{Job, JobState};
use crate::store::Store;

/// The caller-supplied payload. Extra fields are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct JobPayload {
    pub id: String,
    pub command: String,
    #[serde(default)]
    pub max_retries: Option<i64>,
    #[serde(default)]
    pub priority: Option<i64>,
}

/// Per-call overrides; each beats the payload's own value.
#[derive(Debug, Clone, Default)]
pub struct EnqueueOptions {
    pub max_retries: Option<i64>,
    pub priority: Option<i64>,
    /// Earliest run time, canonical UTC. Trusted as provided.
    pub run_at: Option<String>,
    pub delay_seconds: Option<i64>,
}

pub fn parse_payload(raw: &str) -> Result<JobPayload> {
    let payload: JobPayload =
        serde_json::from_str(raw).map_err(|err| QueueError::BadPayload(err.to_string()))?;
    if payload.id.is_empty() {
        return Err(QueueError::BadPayload("'id' must be a non-empty string".into()));
    }
    if payload.command.is_empty() {
        return Err(QueueError::BadPayload(
            "'command' must be a non-empty string".into(),
        ));
    }
    Ok(payload)
}

impl Store {
    /// Insert a new job in `pending`.
    ///
    /// `max_retries` resolves override → payload → config → 3; `priority`
    /// resolves override → payload → 5. Scheduling: `delay_seconds` beats
    /// `run_at`; with neither, the job is eligible immediately.
    pub fn enqueue(&self, payload: &JobPayload, opts: &EnqueueOptions) -> Result<Job> {
        let max_retries = match opts.max_retries.or(payload.max_retries) {
            Some(n) => n,
            None => self.int_config("max_retries", 3)?,
        };
        let priority = opts.priority.or(payload.priority).unwrap_or(5);

        let now = time::now();
        let now_ts = time::format_ts(now);
        let next_run_at = if let Some(delay) = opts.delay_seconds {
            time::format_ts(time::plus_seconds(now, delay))
        } else if let Some(run_at) = &opts.run_at {
            run_at.clone()
        } else {
            now_ts.clone()
        };

        let inserted = self.conn().execute(
            "INSERT INTO jobs (id, command, state, attempts, max_retries, priority,
                               created_at, updated_at, next_run_at)
             VALUES (?1, ?2, ?3, 0, ?4, ?5, ?6, ?6, ?7)",
            params![
                payload.id,
                payload.command,
                JobState::Pending.as_str(),
                max_retries,
                priority,
                now_ts,
                next_run_at
            ],
        );
        match inserted {
            Ok(_) => {}
            Err(err) if is_unique_violation(&err) => {
                return Err(QueueError::Duplicate(payload.id.clone()));
            }
            Err(err) => return Err(err.into()),
        }

        self.get_job(&payload.id)?
            .ok_or_else(|| QueueError::NoSuchJob(payload.id.clone()))
    }
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}
