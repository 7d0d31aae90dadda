//! File write tool: create or overwrite a file, creating parent directories.

use async_trait::async_trait;
use taskloop_core::error::ToolError;
use taskloop_core::tool::{Tool, ToolContext, required_str};
use tracing::debug;

pub struct FileWriteTool;

fn failed(reason: String) -> ToolError {
    ToolError::ExecutionFailed {
        tool_name: "write_file".into(),
        reason,
    }
}

#[async_trait]
impl Tool for FileWriteTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Write content to a file. Creates the file and any missing parent directories; overwrites existing content."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "file_path": {
                    "type": "string",
                    "description": "Path of the file to write"
                },
                "content": {
                    "type": "string",
                    "description": "The full content to write"
                }
            },
            "required": ["file_path", "content"]
        })
    }

    async fn execute(&self, input: &serde_json::Value, ctx: &ToolContext) -> Result<String, ToolError> {
        let file_path = required_str(input, "file_path")?;
        let content = required_str(input, "content")?;
        let path = ctx.resolve(file_path);

        if let Some(parent) = path.parent()
            && let Err(e) = tokio::fs::create_dir_all(parent).await
        {
            return Err(failed(format!("Failed to create directory {}: {e}", parent.display())));
        }

        tokio::fs::write(&path, content)
            .await
            .map_err(|e| failed(format!("Failed to write {file_path}: {e}")))?;

        debug!(path = %path.display(), bytes = content.len(), "Wrote file");
        Ok(format!("Successfully wrote {} bytes to {file_path}", content.len()))
    }
}
