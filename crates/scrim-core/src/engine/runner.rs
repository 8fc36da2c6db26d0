//! Subprocess execution for script loads and item invocations.
//!
//! Every run is bounded by a hard timeout and a cancellation token.
//! Children are spawned in their own process group so cancellation can
//! signal the whole tree, not just the direct child.

use crate::script::Script;
use crate::{Error, Result};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::time::{Instant, sleep, sleep_until, timeout_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Environment variable carrying the effective query to child scripts.
pub const QUERY_ENV: &str = "SCRIM_QUERY";

/// Hard timeout for list loads.
pub(crate) const LOAD_TIMEOUT: Duration = Duration::from_secs(5);

/// Hard timeout for item invocations.
pub(crate) const RUN_TIMEOUT: Duration = Duration::from_secs(30);

/// Grace window after SIGTERM before escalating to SIGKILL.
const TERM_GRACE: Duration = Duration::from_millis(250);
const TERM_POLL: Duration = Duration::from_millis(50);

enum RunEnd<T> {
    Done(T),
    Cancelled,
    TimedOut,
}

fn base_command(script: &Script, query: Option<&str>) -> Command {
    let mut command = Command::new(script.conf().resolved_path());
    command.stdin(Stdio::null()).kill_on_drop(true);
    if let Some(query) = query {
        command.env(QUERY_ENV, query);
    }
    // Own process group so cancellation reaches grandchildren too
    #[cfg(unix)]
    command.process_group(0);
    command
}

/// Run the script for its line output.
///
/// Only a run that reaches EOF and exits zero yields lines; timeout,
/// cancellation, or failure discards everything already read, so cached
/// state never sees a half-written update.
///
/// # Errors
///
/// `Error::Process` if the child cannot be spawned, `Error::Timeout` /
/// `Error::Cancelled` when the run is cut short (the process group is
/// signalled first), `Error::ScriptFailed` on a non-zero exit.
pub(crate) async fn capture_lines(
    script: &Script,
    query: Option<&str>,
    cancel: &CancellationToken,
    timeout: Duration,
) -> Result<Vec<String>> {
    let mut command = base_command(script, query);
    command.stdout(Stdio::piped()).stderr(Stdio::null());

    let mut child = spawn(command, script)?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| Error::Process("no stdout handle".to_string()))?;

    let deadline = Instant::now() + timeout;
    let mut lines = Vec::new();

    let end = {
        let mut reader = BufReader::new(stdout).lines();
        let drained = async {
            while let Some(line) = reader.next_line().await? {
                lines.push(line);
            }
            std::io::Result::Ok(())
        };
        tokio::select! {
            result = drained => RunEnd::Done(result),
            () = cancel.cancelled() => RunEnd::Cancelled,
            () = sleep_until(deadline) => RunEnd::TimedOut,
        }
    };

    match end {
        RunEnd::Done(Ok(())) => {}
        RunEnd::Done(Err(e)) => {
            terminate(&mut child, script.name()).await;
            return Err(Error::Io(e));
        }
        RunEnd::Cancelled => {
            terminate(&mut child, script.name()).await;
            return Err(Error::Cancelled);
        }
        RunEnd::TimedOut => {
            terminate(&mut child, script.name()).await;
            return Err(Error::Timeout {
                script: script.name().to_string(),
                timeout,
            });
        }
    }

    // Stdout is closed; the child may still linger until the deadline.
    let Ok(status) = timeout_at(deadline, child.wait()).await else {
        terminate(&mut child, script.name()).await;
        return Err(Error::Timeout {
            script: script.name().to_string(),
            timeout,
        });
    };
    let status = status?;
    if !status.success() {
        return Err(Error::ScriptFailed {
            script: script.name().to_string(),
            detail: status.to_string(),
        });
    }

    Ok(lines)
}

/// Invoke the script with the selected item as its argument.
///
/// Combined output is captured for diagnostics only; cached lines are
/// never touched on this path.
///
/// # Errors
///
/// Same taxonomy as [`capture_lines`]; failure details include the
/// child's combined output.
pub(crate) async fn run_item(
    script: &Script,
    item: &str,
    query: &str,
    cancel: &CancellationToken,
    timeout: Duration,
) -> Result<()> {
    let mut command = base_command(script, Some(query));
    command
        .arg(item)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = spawn(command, script)?;
    let mut stdout = child
        .stdout
        .take()
        .ok_or_else(|| Error::Process("no stdout handle".to_string()))?;
    let mut stderr = child
        .stderr
        .take()
        .ok_or_else(|| Error::Process("no stderr handle".to_string()))?;

    let deadline = Instant::now() + timeout;

    let end = {
        let gathered = async {
            let mut out = String::new();
            let mut err = String::new();
            let _ = tokio::join!(stdout.read_to_string(&mut out), stderr.read_to_string(&mut err));
            out.push_str(&err);
            out
        };
        tokio::select! {
            output = gathered => RunEnd::Done(output),
            () = cancel.cancelled() => RunEnd::Cancelled,
            () = sleep_until(deadline) => RunEnd::TimedOut,
        }
    };

    let output = match end {
        RunEnd::Done(output) => output,
        RunEnd::Cancelled => {
            terminate(&mut child, script.name()).await;
            return Err(Error::Cancelled);
        }
        RunEnd::TimedOut => {
            terminate(&mut child, script.name()).await;
            return Err(Error::Timeout {
                script: script.name().to_string(),
                timeout,
            });
        }
    };

    let Ok(status) = timeout_at(deadline, child.wait()).await else {
        terminate(&mut child, script.name()).await;
        return Err(Error::Timeout {
            script: script.name().to_string(),
            timeout,
        });
    };
    let status = status?;
    if !status.success() {
        let output = output.trim();
        let detail = if output.is_empty() {
            status.to_string()
        } else {
            format!("{status}: {output}")
        };
        return Err(Error::ScriptFailed {
            script: script.name().to_string(),
            detail,
        });
    }

    debug!(script = script.name(), "item invocation succeeded");
    Ok(())
}

fn spawn(mut command: Command, script: &Script) -> Result<Child> {
    command.spawn().map_err(|e| {
        Error::Process(format!(
            "spawn {}: {e}",
            script.conf().resolved_path().display()
        ))
    })
}

/// Signal the child's process group: SIGTERM, a short grace window with
/// liveness polling, then SIGKILL for anything still alive. The group is
/// probed rather than the leader pid alone, so children that outlive the
/// leader are not orphaned.
async fn terminate(child: &mut Child, script: &str) {
    #[cfg(unix)]
    if let Some(pid) = child.id() {
        // Spawned with process_group(0), so the pgid equals the pid.
        if pgroup::signal(pid, libc::SIGTERM).is_ok() {
            let deadline = Instant::now() + TERM_GRACE;
            while Instant::now() < deadline && pgroup::alive(pid) {
                sleep(TERM_POLL).await;
            }
            if pgroup::alive(pid) {
                warn!(script, pid, "process group survived SIGTERM, sending SIGKILL");
                let _ = pgroup::signal(pid, libc::SIGKILL);
            }
        }
    }

    #[cfg(not(unix))]
    let _ = child.kill().await;

    // Reap, and catch anything the group signal missed
    let _ = child.kill().await;
    let _ = child.wait().await;
}

#[cfg(unix)]
mod pgroup {
    //! Process-group signalling. A negative pid targets the whole group.

    /// Send `signal` to the process group.
    // pids fit in i32; the wrap cannot occur for real pids
    #[allow(clippy::cast_possible_wrap)]
    pub(super) fn signal(pgid: u32, signal: libc::c_int) -> std::io::Result<()> {
        // Safety: kill() is a plain syscall with no memory safety concerns
        let rc = unsafe { libc::kill(-(pgid as libc::pid_t), signal) };
        if rc == 0 {
            Ok(())
        } else {
            Err(std::io::Error::last_os_error())
        }
    }

    /// Whether any process in the group is still alive. Signal 0 probes
    /// without delivering; EPERM still means the group exists.
    #[allow(clippy::cast_possible_wrap)]
    pub(super) fn alive(pgid: u32) -> bool {
        // Safety: kill() with signal 0 only checks existence
        let rc = unsafe { libc::kill(-(pgid as libc::pid_t), 0) };
        rc == 0 || std::io::Error::last_os_error().raw_os_error() != Some(libc::ESRCH)
    }
}
