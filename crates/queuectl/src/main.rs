mod cli;
mod render;
mod supervisor;

use std::path::Path;
use std::process::ExitCode;

use clap::Parser;

use queuectl_core::{paths, time};
use queuectl_engine::{
    EnqueueOptions, JobState, QueueError, Store, parse_payload, run_worker,
};

use crate::cli::{Cli, Command, ConfigCommand, DlqCommand, EnqueueArgs, ListArgs, WorkerCommand};

// 0 success, 1 user error, 2 internal failure.
const EXIT_USER_ERROR: u8 = 1;
const EXIT_INTERNAL: u8 = 2;

// A mistake in how the tool was invoked, as opposed to a queue/store fault.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
struct UserError(String);

fn is_user_error(err: &anyhow::Error) -> bool {
    if err.downcast_ref::<UserError>().is_some() {
        return true;
    }
    matches!(err.downcast_ref::<QueueError>(), Some(qerr) if qerr.is_user_error())
}

#[tokio::main]
async fn main() -> ExitCode {
    // Usage mistakes exit 1 (clap's native convention is 2); --help and
    // --version stay exit 0.
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let code = if err.use_stderr() { EXIT_USER_ERROR } else { 0 };
            let _ = err.print();
            return ExitCode::from(code);
        }
    };

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            if is_user_error(&err) {
                ExitCode::from(EXIT_USER_ERROR)
            } else {
                ExitCode::from(EXIT_INTERNAL)
            }
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let data_dir = paths::resolve_data_dir()?;

    match cli.command {
        Command::Enqueue(args) => enqueue(&data_dir, args),
        Command::Status => status(&data_dir),
        Command::List(args) => list(&data_dir, args),
        Command::Dlq(cmd) => dlq(&data_dir, cmd),
        Command::Config(cmd) => config(&data_dir, cmd),
        Command::Worker(WorkerCommand::Start { count }) => {
            init_tracing();
            supervisor::start_workers(&data_dir, count as usize).await
        }
        Command::Worker(WorkerCommand::Stop) => {
            supervisor::request_stop(&data_dir)?;
            println!("Requested workers to stop (flag written)");
            Ok(())
        }
        Command::Worker(WorkerCommand::Run) => {
            init_tracing();
            // The supervisor owns interrupt handling: a terminal CTRL+C
            // reaches the whole process group, and dying mid-job would
            // forfeit the graceful drain, so the worker swallows SIGINT and
            // waits for the stop flag instead.
            tokio::spawn(async {
                loop {
                    if tokio::signal::ctrl_c().await.is_err() {
                        return;
                    }
                }
            });
            tokio::task::spawn_blocking(move || run_worker(&data_dir)).await??;
            Ok(())
        }
    }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn enqueue(data_dir: &Path, args: EnqueueArgs) -> anyhow::Result<()> {
    let raw = match (&args.file, &args.job_id, &args.command) {
        (Some(path), _, _) => std::fs::read_to_string(path)
            .map_err(|err| UserError(format!("read payload file {}: {err}", path.display())))?,
        (None, Some(id), Some(command)) => {
            serde_json::json!({ "id": id, "command": command }).to_string()
        }
        _ => {
            return Err(UserError(
                "either --file or both --id and --cmd are required".into(),
            )
            .into());
        }
    };

    let payload = parse_payload(&raw)?;
    let opts = EnqueueOptions {
        max_retries: args.max_retries,
        priority: args.priority,
        run_at: args.run_at,
        delay_seconds: args.delay,
    };

    let store = Store::open(data_dir)?;
    let job = store.enqueue(&payload, &opts)?;
    println!(
        "Job enqueued: {}  (priority={}, next_run_at={}, retries={})",
        job.id,
        job.priority,
        job.next_run_at.as_deref().unwrap_or("-"),
        job.max_retries
    );
    Ok(())
}

fn status(data_dir: &Path) -> anyhow::Result<()> {
    let store = Store::open(data_dir)?;

    let counts = store.counts_by_state()?;
    let rows: Vec<Vec<String>> = counts
        .iter()
        .map(|(state, count)| vec![state.to_string(), count.to_string()])
        .collect();
    println!("Job summary");
    print!("{}", render::render_table(&["state", "count"], &rows));

    let now = time::now();
    let workers = store.list_workers()?;
    let rows: Vec<Vec<String>> = workers
        .iter()
        .map(|w| {
            let age = time::parse_ts(&w.last_heartbeat_at)
                .map(|t| (now - t).num_seconds().max(0).to_string())
                .unwrap_or_else(|_| "?".into());
            vec![w.id.clone(), age]
        })
        .collect();
    println!();
    println!("Workers");
    print!(
        "{}",
        render::render_table(&["id", "last seen (sec ago)"], &rows)
    );
    Ok(())
}

fn list(data_dir: &Path, args: ListArgs) -> anyhow::Result<()> {
    let state: JobState = args.state.parse()?;
    let store = Store::open(data_dir)?;

    let jobs = store.list_jobs(state)?;
    let rows: Vec<Vec<String>> = jobs
        .iter()
        .map(|job| {
            vec![
                job.id.clone(),
                job.state.to_string(),
                job.attempts.to_string(),
                job.next_run_at.clone().unwrap_or_else(|| "-".into()),
                render::single_line(job.last_error.as_deref().unwrap_or("")),
            ]
        })
        .collect();
    println!("Jobs in state: {state}");
    print!(
        "{}",
        render::render_table(&["id", "state", "attempts", "next_run_at", "last_error"], &rows)
    );
    Ok(())
}

fn dlq(data_dir: &Path, cmd: DlqCommand) -> anyhow::Result<()> {
    match cmd {
        DlqCommand::List => {
            let store = Store::open(data_dir)?;
            let jobs = store.dlq_list()?;
            let rows: Vec<Vec<String>> = jobs
                .iter()
                .map(|job| {
                    vec![
                        job.id.clone(),
                        job.attempts.to_string(),
                        render::single_line(job.last_error.as_deref().unwrap_or("")),
                    ]
                })
                .collect();
            println!("Dead letter queue");
            print!(
                "{}",
                render::render_table(&["id", "attempts", "last_error"], &rows)
            );
        }
        DlqCommand::Retry { job_id } => {
            let mut store = Store::open(data_dir)?;
            store.dlq_retry(&job_id)?;
            println!("Job {job_id} moved back to queue");
        }
    }
    Ok(())
}

fn config(data_dir: &Path, cmd: ConfigCommand) -> anyhow::Result<()> {
    let store = Store::open(data_dir)?;
    match cmd {
        ConfigCommand::Get { key } => match store.config_get(&key)? {
            Some(value) => println!("{value}"),
            None => return Err(UserError(format!("{key} is not set")).into()),
        },
        ConfigCommand::Set { key, value } => {
            store.config_set(&key, &value)?;
            println!("OK {key}={value}");
        }
        ConfigCommand::Show => {
            let rows: Vec<Vec<String>> = store
                .config_all()?
                .into_iter()
                .map(|(k, v)| vec![k, v])
                .collect();
            print!("{}", render::render_table(&["key", "value"], &rows));
        }
    }
    Ok(())
}
