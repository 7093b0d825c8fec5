use std::path::Path;
use std::time::Duration;

use anyhow::Context as _;
use tokio::process::{Child, Command};
use tracing::{info, warn};

use queuectl_core::paths;
use queuectl_engine::Store;

pub fn request_stop(data_dir: &Path) -> anyhow::Result<()> {
    std::fs::create_dir_all(data_dir)?;
    std::fs::write(paths::stop_flag_path(data_dir), "stop")?;
    Ok(())
}

pub fn clear_stop_flag(data_dir: &Path) -> anyhow::Result<()> {
    match std::fs::remove_file(paths::stop_flag_path(data_dir)) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err.into()),
    }
}

pub async fn start_workers(data_dir: &Path, count: usize) -> anyhow::Result<()> {
    // Create the directory and schema up front so workers never race the
    // first initialization.
    Store::open(data_dir).context("initialize store")?;
    clear_stop_flag(data_dir)?;

    let exe = std::env::current_exe().context("resolve current executable")?;
    let mut children: Vec<Child> = Vec::with_capacity(count);
    for idx in 0..count {
        let child = Command::new(&exe)
            .arg("worker")
            .arg("run")
            .env("QUEUECTL_HOME", data_dir)
            .spawn()
            .with_context(|| format!("spawn worker {idx}"))?;
        children.push(child);
    }
    info!(count, "supervisor started workers; press CTRL+C to stop");

    let mut interrupts: u8 = 0;
    loop {
        reap_exited(&mut children);
        if children.is_empty() {
            break;
        }

        tokio::select! {
            _ = tokio::time::sleep(Duration::from_millis(500)) => {}
            res = tokio::signal::ctrl_c() => {
                res.context("listen for CTRL+C")?;
                interrupts = interrupts.saturating_add(1);
                if interrupts == 1 {
                    info!("CTRL+C received, requesting graceful stop");
                    request_stop(data_dir)?;
                } else {
                    warn!("second CTRL+C, killing workers");
                    for child in &mut children {
                        let _ = child.kill().await;
                    }
                }
            }
        }
    }

    clear_stop_flag(data_dir)?;
    info!("supervisor exiting");
    Ok(())
}

fn reap_exited(children: &mut Vec<Child>) {
    children.retain_mut(|child| {
        let pid = child.id().unwrap_or_default();
        match child.try_wait() {
            Ok(Some(status)) => {
                if status.success() {
                    info!(pid, "worker exited");
                } else {
                    warn!(pid, %status, "worker exited abnormally");
                }
                false
            }
            Ok(None) => true,
            Err(err) => {
                warn!(pid, "wait on worker failed: {err}");
                false
            }
        }
    });
}
