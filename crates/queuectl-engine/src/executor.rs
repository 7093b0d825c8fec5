use std::process::Command;

use anyhow::Context as _;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ExecOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Text worth recording when the command failed: stderr when it said
    /// anything, stdout otherwise.
    pub fn failure_text(&self) -> &str {
        if !self.stderr.trim().is_empty() {
            &self.stderr
        } else {
            &self.stdout
        }
    }
}

/// Runs a job's command and reports what happened. Implementations must not
/// panic; a failed spawn is an `Err` the worker records against the job.
pub trait Executor {
    fn run(&self, command: &str) -> anyhow::Result<ExecOutput>;
}

/// Interprets commands with the platform shell and captures both streams.
#[derive(Debug, Default, Clone, Copy)]
pub struct ShellExecutor;

impl Executor for ShellExecutor {
    fn run(&self, command: &str) -> anyhow::Result<ExecOutput> {
        let output = shell_command(command)
            .output()
            .with_context(|| format!("spawn shell for {command:?}"))?;

        Ok(ExecOutput {
            // A signal-killed child has no exit code.
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[cfg(unix)]
fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command);
    cmd
}

#[cfg(windows)]
fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.arg("/C").arg(command);
    cmd
}
