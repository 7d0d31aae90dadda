//! Running host commands under a deadline.

use std::process::{Output, Stdio};
use std::time::Duration;
use taskloop_core::error::ToolError;
use tokio::process::Command;
use tracing::debug;

/// Run `command` to completion, or kill it once `timeout` elapses.
///
/// On Unix the command leads its own process group, and the whole group is
/// killed on timeout so that background jobs started by the script go too.
pub(crate) async fn output_with_timeout(
    mut command: Command,
    timeout: Duration,
    tool_name: &str,
) -> Result<Output, ToolError> {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    #[cfg(unix)]
    command.process_group(0);

    let child = command.spawn().map_err(|e| ToolError::ExecutionFailed {
        tool_name: tool_name.into(),
        reason: e.to_string(),
    })?;
    let pid = child.id();

    match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(e)) => Err(ToolError::ExecutionFailed {
            tool_name: tool_name.into(),
            reason: e.to_string(),
        }),
        Err(_) => {
            if let Some(pid) = pid {
                kill_process_group(pid);
            }
            Err(ToolError::Timeout {
                tool_name: tool_name.into(),
                timeout_secs: timeout.as_secs(),
            })
        }
    }
}

#[cfg(unix)]
fn kill_process_group(pgid: u32) {
    debug!(pgid, "Killing timed-out process group");
    // SAFETY: killpg only sends a signal. The group id is the pid of a child
    // spawned with process_group(0), so it names that child's group alone.
    let rc = unsafe { libc::killpg(pgid as libc::pid_t, libc::SIGKILL) };
    if rc != 0 {
        debug!(pgid, error = %std::io::Error::last_os_error(), "killpg failed");
    }
}

#[cfg(not(unix))]
fn kill_process_group(pgid: u32) {
    debug!(pgid, "Process groups unavailable; only the direct child is killed");
}

/// `sh -c <script>` on Unix, `cmd /C <script>` on Windows.
pub(crate) fn shell(script: &str) -> Command {
    if cfg!(target_os = "windows") {
        let mut cmd = Command::new("cmd");
        cmd.args(["/C", script]);
        cmd
    } else {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", script]);
        cmd
    }
}
