//! Local child-process execution with a timeout and SIGTERM-then-SIGKILL
//! shutdown, used by every cloud driver's `run`/`upload`/`interactive` to
//! invoke the provider's CLI or `ssh`/`scp`.
//!
//! `Stdio::piped()` plus a poll-based timeout check, scaled down to a
//! single call instead of a long-lived supervised state machine.
use std::io::Read;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{instrument, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(100);
const KILL_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("failed to spawn `{0}`: {1}")]
    Spawn(String, #[source] std::io::Error),
    #[error("command timed out after {0:?}")]
    Timeout(Duration),
    #[error("failed to read child output: {0}")]
    Io(#[source] std::io::Error),
}

pub struct ExecOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

/// Runs `argv` to completion, capturing combined stdout/stderr. `timeout`
/// of `None` means the default one-shot ceiling (300s); pass
/// `Some(Duration::MAX)` for genuinely unbounded (interactive) execution.
#[instrument(skip_all, fields(cmd = %argv.join(" ")))]
pub fn run_capture(argv: &[String], timeout: Option<Duration>) -> Result<ExecOutput, ExecError> {
    let timeout = timeout.unwrap_or(Duration::from_secs(300));
    let (bin, args) = argv.split_first().expect("argv must be non-empty");
    let mut child = Command::new(bin)
        .args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|err| ExecError::Spawn(bin.clone(), err))?;

    if is_running_after_timeout(&mut child, timeout) {
        warn!(?timeout, "command exceeded timeout, sending SIGTERM");
        terminate(&mut child);
        return Err(ExecError::Timeout(timeout));
    }

    let status = child.wait().map_err(ExecError::Io)?;
    let mut stdout = String::new();
    let mut stderr = String::new();
    if let Some(mut out) = child.stdout.take() {
        out.read_to_string(&mut stdout).map_err(ExecError::Io)?;
    }
    if let Some(mut err) = child.stderr.take() {
        err.read_to_string(&mut stderr).map_err(ExecError::Io)?;
    }

    Ok(ExecOutput {
        exit_code: status.code().unwrap_or(-1),
        stdout,
        stderr,
    })
}

/// Hands the terminal to `argv` as the foreground process, inheriting
/// stdio. Used for the interactive launch.
pub fn run_interactive(argv: &[String]) -> Result<i32, ExecError> {
    let (bin, args) = argv.split_first().expect("argv must be non-empty");
    let status = Command::new(bin)
        .args(args)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()
        .map_err(|err| ExecError::Spawn(bin.clone(), err))?;
    Ok(status.code().unwrap_or(-1))
}

fn is_running_after_timeout(child: &mut Child, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        match child.try_wait() {
            Ok(Some(_)) => return false,
            Ok(None) => std::thread::sleep(POLL_INTERVAL),
            Err(_) => return false,
        }
    }
    true
}

#[cfg(target_family = "unix")]
fn terminate(child: &mut Child) {
    use nix::sys::signal::{self, Signal};
    use nix::unistd::Pid;

    let pid = Pid::from_raw(child.id() as i32);
    let graceful = signal::kill(pid, Signal::SIGTERM);
    if graceful.is_err() || is_running_after_timeout(child, KILL_GRACE) {
        let _ = child.kill();
    }
}

#[cfg(target_family = "windows")]
fn terminate(child: &mut Child) {
    let _ = child.kill();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captures_stdout_and_exit_code() {
        let out = run_capture(&["echo".to_string(), "hello".to_string()], None).unwrap();
        assert_eq!(out.exit_code, 0);
        assert_eq!(out.stdout.trim(), "hello");
    }

    #[test]
    fn nonzero_exit_is_reported_not_errored() {
        let out = run_capture(&["sh".to_string(), "-c".to_string(), "exit 7".to_string()], None)
            .unwrap();
        assert_eq!(out.exit_code, 7);
    }

    #[test]
    fn timeout_kills_child() {
        let err = run_capture(
            &["sleep".to_string(), "5".to_string()],
            Some(Duration::from_millis(100)),
        )
        .unwrap_err();
        assert!(matches!(err, ExecError::Timeout(_)));
    }
}
