//! Core engine for the `queuectl` job queue.
//!
//! Everything durable lives in one SQLite file owned by [`Store`]: jobs,
//! worker heartbeats and config. Producers insert with [`Store::enqueue`].
//! Workers take work through [`Store::claim_next`], which hands out the next
//! eligible job under a lease inside a single immediate write transaction
//! and reclaims leases whose workers died. [`Store::complete_job`] and
//! [`Store::fail_or_retry`] settle an execution, the latter scheduling
//! retries with capped exponential backoff until the job is dead-lettered;
//! [`Store::dlq_retry`] sends a dead job back to the queue.
//!
//! [`run_worker_loop`] ties it together: heartbeat, claim, execute through
//! an [`Executor`], settle, sleep, until the stop flag appears in the data
//! directory. Execution is at-least-once: leases are not renewed mid-run,
//! so a job that outlives its lease may be claimed again in parallel.
//!
//! All persisted times use the fixed-width `YYYY-MM-DD HH:MM:SS` UTC form,
//! so stored text compares lexicographically in chronological order; the
//! claim predicate depends on that.

mod claim;
mod enqueue;
mod error;
mod executor;
mod inspect;
mod job;
mod lifecycle;
mod store;
mod worker;

pub use enqueue::{EnqueueOptions, JobPayload, parse_payload};
pub use error::{QueueError, Result};
pub use executor::{ExecOutput, Executor, ShellExecutor};
pub use inspect::WorkerRecord;
pub use job::{Job, JobState};
pub use lifecycle::{FailOutcome, LAST_ERROR_MAX_CHARS};
pub use store::{CONFIG_DEFAULTS, Store};
pub use worker::{run_worker, run_worker_loop};
