//! Bash tool: execute a shell command in the working directory.
//!
//! No allowlist: commands run with the privileges of the agent process.
//! The only guard is the timeout.

use async_trait::async_trait;
use std::time::Duration;
use taskloop_core::error::ToolError;
use taskloop_core::tool::{Tool, ToolContext, required_str};
use tracing::{debug, warn};

use crate::process::{output_with_timeout, shell};

pub const DEFAULT_BASH_TIMEOUT: Duration = Duration::from_secs(30);

pub struct BashTool {
    timeout: Duration,
}

impl BashTool {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for BashTool {
    fn default() -> Self {
        Self::new(DEFAULT_BASH_TIMEOUT)
    }
}

/// stdout, then labeled stderr if any, then the exit code if non-zero.
fn render_output(stdout: &str, stderr: &str, exit_code: i32) -> String {
    let mut text = stdout.to_string();

    if !stderr.trim().is_empty() {
        if !text.is_empty() && !text.ends_with('\n') {
            text.push('\n');
        }
        text.push_str("STDERR:\n");
        text.push_str(stderr);
    }

    if exit_code != 0 {
        if !text.is_empty() && !text.ends_with('\n') {
            text.push('\n');
        }
        text.push_str(&format!("Exit code: {exit_code}"));
    }

    let text = text.trim_end().to_string();
    if text.is_empty() {
        "(no output)".into()
    } else {
        text
    }
}

#[async_trait]
impl Tool for BashTool {
    fn name(&self) -> &str { "bash" }

    fn description(&self) -> &str {
        "Execute a shell command in the working directory and return stdout, stderr and the exit code. \
         Commands are killed after the timeout."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The shell command to execute"
                }
            },
            "required": ["command"]
        })
    }

    async fn execute(&self, input: &serde_json::Value, ctx: &ToolContext) -> Result<String, ToolError> {
        let command = required_str(input, "command")?;

        debug!(command = %command, cwd = %ctx.working_dir.display(), "Executing shell command");

        let mut cmd = shell(command);
        cmd.current_dir(&ctx.working_dir);
        let output = output_with_timeout(cmd, self.timeout, "bash").await?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let code = output.status.code().unwrap_or(-1);
        if code != 0 {
            warn!(command = %command, exit_code = code, "Command failed");
        }

        Ok(render_output(&stdout, &stderr, code))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> (tempfile::TempDir, ToolContext) {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ToolContext::new(dir.path());
        (dir, ctx)
    }

    #[test]
    fn render_plain_stdout() {
        assert_eq!(render_output("hello\n", "", 0), "hello");
    }

    #[test]
    fn render_stderr_and_exit_code() {
        assert_eq!(
            render_output("partial\n", "boom\n", 2),
            "partial\nSTDERR:\nboom\nExit code: 2"
        );
        assert_eq!(render_output("", "", 1), "Exit code: 1");
        assert_eq!(render_output("", "", 0), "(no output)");
    }

    #[tokio::test]
    async fn execute_echo() {
        let (_dir, ctx) = ctx();
        let output = BashTool::default()
            .execute(&serde_json::json!({"command": "echo hello"}), &ctx)
            .await
            .unwrap();
        assert_eq!(output, "hello");
    }

    #[tokio::test]
    async fn runs_in_working_dir() {
        let (dir, ctx) = ctx();
        std::fs::write(dir.path().join("marker.txt"), "").unwrap();
        let output = BashTool::default()
            .execute(&serde_json::json!({"command": "ls"}), &ctx)
            .await
            .unwrap();
        assert!(output.contains("marker.txt"));
    }

    #[tokio::test]
    async fn nonzero_exit_reported() {
        let (_dir, ctx) = ctx();
        let output = BashTool::default()
            .execute(&serde_json::json!({"command": "echo oops >&2; exit 3"}), &ctx)
            .await
            .unwrap();
        assert!(output.contains("STDERR:\noops"));
        assert!(output.ends_with("Exit code: 3"));
    }

    #[tokio::test]
    async fn timeout_returns_error_instead_of_hanging() {
        let (_dir, ctx) = ctx();
        let start = std::time::Instant::now();
        let err = BashTool::new(Duration::from_secs(1))
            .execute(&serde_json::json!({"command": "sleep 60"}), &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Timeout { timeout_secs: 1, .. }));
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn timeout_kills_background_jobs() {
        let (dir, ctx) = ctx();
        let err = BashTool::new(Duration::from_millis(300))
            .execute(&serde_json::json!({"command": "(sleep 1; touch late.txt) & wait"}), &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Timeout { .. }));

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(!dir.path().join("late.txt").exists());
    }

    #[tokio::test]
    async fn missing_command_argument() {
        let (_dir, ctx) = ctx();
        let result = BashTool::default().execute(&serde_json::json!({}), &ctx).await;
        assert!(matches!(result, Err(ToolError::InvalidArguments(_))));
    }
}
