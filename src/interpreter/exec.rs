// src/interpreter/exec.rs

//! Shell command execution with timeout and captured output

use std::io::{self, Read};
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::debug;
use wait_timeout::ChildExt;

/// Output of a finished (or killed) shell command
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Exit status; `None` when the command was killed on timeout
    pub status: Option<ExitStatus>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Whether the command ran to completion and exited zero
    pub fn success(&self) -> bool {
        self.status.is_some_and(|s| s.success())
    }

    /// Exit code, if the command exited normally
    pub fn code(&self) -> Option<i32> {
        self.status.and_then(|s| s.code())
    }
}

/// Run `command` through `sh -c` in `workdir`
///
/// stdin is closed so interactive tools cannot hang the run. stdout and
/// stderr are drained on background threads while we wait, so chatty
/// builds cannot fill the pipe and deadlock.
pub fn run_shell(
    command: &str,
    workdir: &Path,
    env: &[(String, String)],
    timeout: Duration,
) -> io::Result<CommandOutput> {
    debug!("sh -c {:?} (in {})", command, workdir.display());

    let mut child = Command::new("sh")
        .arg("-c")
        .arg(command)
        .current_dir(workdir)
        .envs(env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let status = wait_or_kill(&mut child, timeout)?;
    if status.is_none() {
        // Killing sh does not kill its children, which may still hold the
        // pipes open; leave the drain threads behind rather than block
        return Ok(CommandOutput {
            status,
            stdout: String::new(),
            stderr: format!("timed out after {}s", timeout.as_secs_f64()),
        });
    }

    Ok(CommandOutput {
        status,
        stdout: join_drain(stdout),
        stderr: join_drain(stderr),
    })
}

fn wait_or_kill(child: &mut Child, timeout: Duration) -> io::Result<Option<ExitStatus>> {
    match child.wait_timeout(timeout)? {
        Some(status) => Ok(Some(status)),
        None => {
            let _ = child.kill();
            let _ = child.wait();
            Ok(None)
        }
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<String>> {
    pipe.map(|mut pipe| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf);
            String::from_utf8_lossy(&buf).into_owned()
        })
    })
}

fn join_drain(handle: Option<JoinHandle<String>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .unwrap_or_default()
}
