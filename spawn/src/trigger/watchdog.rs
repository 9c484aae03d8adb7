//! Workflow script supervision: detached spawn, stdio forwarded onward to
//! the listener, an idle-log watchdog, and a hard wall-clock ceiling.
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use std::io;
use std::os::unix::process::CommandExt;
use std::path::Path;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::process::Command;
use tracing::{info, warn};

const IDLE_POLL_INTERVAL: Duration = Duration::from_secs(5);
const KILL_GRACE: Duration = Duration::from_secs(5);

pub struct SupervisionConfig {
    pub idle_timeout: Duration,
    pub hard_ceiling: Duration,
}

/// Spawns `script_path` detached into its own process group (so the
/// watchdog can signal the whole tree), forwarding combined stdio onward to
/// this process's own stdio while tracking the last time either stream
/// produced a byte.
pub fn spawn(
    script_path: &Path,
    working_dir: Option<&Path>,
    config: SupervisionConfig,
) -> io::Result<u32> {
    let mut command = Command::new(script_path);
    command.current_dir(working_dir_for(script_path, working_dir));
    command.process_group(0);
    command.stdout(Stdio::piped()).stderr(Stdio::piped()).kill_on_drop(false);

    let mut child = command.spawn()?;
    let pid = child
        .id()
        .ok_or_else(|| io::Error::other("spawned child has no pid"))?;

    let last_activity = Arc::new(Mutex::new(Instant::now()));
    if let Some(stdout) = child.stdout.take() {
        tokio::spawn(pump(stdout, tokio::io::stdout(), last_activity.clone()));
    }
    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(pump(stderr, tokio::io::stderr(), last_activity.clone()));
    }
    tokio::spawn(watch(child, pid, last_activity, config));
    Ok(pid)
}

fn working_dir_for<'a>(script_path: &'a Path, override_dir: Option<&'a Path>) -> &'a Path {
    override_dir
        .or_else(|| script_path.parent())
        .unwrap_or_else(|| Path::new("."))
}

async fn pump<R, W>(mut reader: R, mut writer: W, last_activity: Arc<Mutex<Instant>>)
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = [0u8; 4096];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) | Err(_) => return,
            Ok(n) => {
                *last_activity.lock().expect("activity mutex poisoned") = Instant::now();
                let _ = writer.write_all(&buf[..n]).await;
            }
        }
    }
}

async fn watch(
    mut child: tokio::process::Child,
    pid: u32,
    last_activity: Arc<Mutex<Instant>>,
    config: SupervisionConfig,
) {
    let deadline = Instant::now() + config.hard_ceiling;
    loop {
        tokio::select! {
            status = child.wait() => {
                match status {
                    Ok(status) => info!(pid, ?status, "workflow cycle exited"),
                    Err(err) => warn!(pid, %err, "failed to wait on workflow cycle"),
                }
                return;
            }
            _ = tokio::time::sleep(IDLE_POLL_INTERVAL) => {
                let idle_for = last_activity.lock().expect("activity mutex poisoned").elapsed();
                if idle_for > config.idle_timeout {
                    warn!(pid, ?idle_for, "idle watchdog tripped, killing process tree");
                    kill_tree(pid).await;
                    return;
                }
                if Instant::now() > deadline {
                    warn!(pid, "hard wall-clock ceiling reached, killing process tree");
                    kill_tree(pid).await;
                    return;
                }
            }
        }
    }
}

/// SIGTERM the process group and leader, wait out a grace period, then
/// SIGKILL whatever is still alive. Mirrors [`crate::cloud::process::terminate`]'s
/// escalation, generalized from a single child to a whole process tree.
async fn kill_tree(pid: u32) {
    let group = Pid::from_raw(-(pid as i32));
    let leader = Pid::from_raw(pid as i32);
    let _ = signal::kill(group, Signal::SIGTERM);
    let _ = signal::kill(leader, Signal::SIGTERM);

    tokio::time::sleep(KILL_GRACE).await;
    if signal::kill(leader, None).is_ok() {
        let _ = signal::kill(group, Signal::SIGKILL);
        let _ = signal::kill(leader, Signal::SIGKILL);
    }
}
