//! Grep tool: list files whose contents match a pattern.
//!
//! Delegates to the host `grep -rlE`, so the pattern is a POSIX extended
//! regular expression, case-sensitive. The search path goes through the shell
//! unquoted so that globs such as `memories/tasks/*.md` expand.

use async_trait::async_trait;
use std::time::Duration;
use taskloop_core::error::ToolError;
use taskloop_core::tool::{Tool, ToolContext, optional_str, required_str};
use tracing::debug;

use crate::process::{output_with_timeout, shell};

pub const DEFAULT_GREP_TIMEOUT: Duration = Duration::from_secs(10);

const NO_MATCHES: &str = "No matches found";

/// Characters that would let a search path run extra shell commands.
const SHELL_CONTROL: &[char] = &[';', '&', '|', '`', '$', '<', '>', '(', ')', '\n', '\'', '"', '\\'];

pub struct GrepTool {
    timeout: Duration,
}

impl GrepTool {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for GrepTool {
    fn default() -> Self {
        Self::new(DEFAULT_GREP_TIMEOUT)
    }
}

#[async_trait]
impl Tool for GrepTool {
    fn name(&self) -> &str { "grep" }

    fn description(&self) -> &str {
        "Search file contents recursively with an extended regular expression and list the paths of matching files. \
         The path may contain shell globs."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "pattern": {
                    "type": "string",
                    "description": "Extended regular expression to search for"
                },
                "path": {
                    "type": "string",
                    "description": "File, directory or glob to search (defaults to the working directory)"
                }
            },
            "required": ["pattern"]
        })
    }

    async fn execute(&self, input: &serde_json::Value, ctx: &ToolContext) -> Result<String, ToolError> {
        let pattern = required_str(input, "pattern")?;
        let path = optional_str(input, "path").unwrap_or(".");

        if path.contains(SHELL_CONTROL) {
            return Err(ToolError::InvalidArguments(format!(
                "path contains shell control characters: {path}"
            )));
        }

        debug!(pattern = %pattern, path = %path, "Searching file contents");

        // The pattern travels as $1 so the shell never interprets it.
        let mut cmd = shell(&format!("grep -rlE -e \"$1\" -- {path}"));
        cmd.arg("grep").arg(pattern).current_dir(&ctx.working_dir);
        let output = output_with_timeout(cmd, self.timeout, "grep").await?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let matches: Vec<&str> = stdout.lines().filter(|l| !l.is_empty()).collect();

        match output.status.code() {
            Some(0) | Some(1) if matches.is_empty() => Ok(NO_MATCHES.into()),
            _ if !matches.is_empty() => Ok(matches.join("\n")),
            _ => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                Err(ToolError::ExecutionFailed {
                    tool_name: "grep".into(),
                    reason: stderr.trim().to_string(),
                })
            }
        }
    }
}
