use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "queuectl", version, about = "Durable multi-worker background job queue")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    Enqueue(EnqueueArgs),
    Status,
    List(ListArgs),
    #[command(subcommand)]
    Dlq(DlqCommand),
    #[command(subcommand)]
    Worker(WorkerCommand),
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Debug, Args)]
pub struct EnqueueArgs {
    #[arg(long = "id", short = 'i', value_name = "ID")]
    pub job_id: Option<String>,

    #[arg(long = "cmd", short = 'c', value_name = "COMMAND")]
    pub command: Option<String>,

    /// JSON file with the job payload (instead of --id/--cmd).
    #[arg(long, short = 'f', value_name = "PATH")]
    pub file: Option<PathBuf>,

    /// Maximum attempts before the job is dead-lettered.
    #[arg(long, value_name = "N")]
    pub max_retries: Option<i64>,

    /// Smaller runs first.
    #[arg(long, value_name = "N")]
    pub priority: Option<i64>,

    /// Earliest run time, canonical UTC (`YYYY-MM-DD HH:MM:SS`).
    #[arg(long, value_name = "TIMESTAMP")]
    pub run_at: Option<String>,

    /// Delay the first run by this many seconds.
    #[arg(long, value_name = "SECONDS")]
    pub delay: Option<i64>,
}

#[derive(Debug, Args)]
pub struct ListArgs {
    /// Job state to filter by (pending, processing, completed, failed, dead).
    #[arg(long, value_name = "STATE")]
    pub state: String,
}

#[derive(Debug, Subcommand)]
pub enum DlqCommand {
    List,
    Retry {
        #[arg(value_name = "JOB_ID")]
        job_id: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum WorkerCommand {
    Start {
        /// Number of worker processes.
        #[arg(
            short = 'n',
            long,
            env = "QUEUECTL_WORKERS",
            default_value_t = 1,
            value_parser = clap::value_parser!(u16).range(1..=512)
        )]
        count: u16,
    },
    Stop,
    /// Run a single worker in the foreground (spawned by `worker start`).
    #[command(hide = true)]
    Run,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    Get {
        #[arg(value_name = "KEY")]
        key: String,
    },
    Set {
        #[arg(value_name = "KEY")]
        key: String,
        #[arg(value_name = "VALUE")]
        value: String,
    },
    Show,
}
