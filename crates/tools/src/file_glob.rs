//! Glob tool: expand a file pattern, `**` included.

use async_trait::async_trait;
use std::path::Path;
use taskloop_core::error::ToolError;
use taskloop_core::tool::{Tool, ToolContext, required_str};

const NO_FILES: &str = "No files matched the pattern";

pub struct GlobTool;

/// Expand `pattern` and return matching file paths, sorted.
///
/// Relative patterns are matched under `working_dir` and reported relative
/// to it; absolute patterns are reported as absolute paths.
fn expand(pattern: &str, working_dir: &Path) -> Result<Vec<String>, ToolError> {
    let relative = !Path::new(pattern).is_absolute();
    let full_pattern = if relative {
        let base = ::glob::Pattern::escape(&working_dir.to_string_lossy());
        format!("{}/{}", base.trim_end_matches('/'), pattern)
    } else {
        pattern.to_string()
    };

    let entries = ::glob::glob(&full_pattern)
        .map_err(|e| ToolError::InvalidArguments(format!("Invalid glob pattern '{pattern}': {e}")))?;

    let mut matches: Vec<String> = entries
        .filter_map(Result::ok)
        .filter(|p| p.is_file())
        .map(|p| {
            let shown = if relative {
                p.strip_prefix(working_dir).map(Path::to_path_buf).unwrap_or(p)
            } else {
                p
            };
            shown.to_string_lossy().into_owned()
        })
        .collect();

    matches.sort();
    matches.dedup();
    Ok(matches)
}

#[async_trait]
impl Tool for GlobTool {
    fn name(&self) -> &str {
        "glob"
    }

    fn description(&self) -> &str {
        "Find files matching a glob pattern such as 'memories/**/*.md'. Results are sorted."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "pattern": {
                    "type": "string",
                    "description": "Glob pattern; '**' matches any number of directories"
                }
            },
            "required": ["pattern"]
        })
    }

    async fn execute(&self, input: &serde_json::Value, ctx: &ToolContext) -> Result<String, ToolError> {
        let pattern = required_str(input, "pattern")?.to_string();
        let working_dir = ctx.working_dir.clone();

        let matches = tokio::task::spawn_blocking(move || expand(&pattern, &working_dir))
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: "glob".into(),
                reason: e.to_string(),
            })??;

        if matches.is_empty() {
            Ok(NO_FILES.into())
        } else {
            Ok(matches.join("\n"))
        }
    }
}
