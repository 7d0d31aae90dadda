//! File read tool: return the full text of a file.

use async_trait::async_trait;
use taskloop_core::error::ToolError;
use taskloop_core::tool::{Tool, ToolContext, required_str};

pub struct FileReadTool;

fn failed(reason: String) -> ToolError {
    ToolError::ExecutionFailed {
        tool_name: "read_file".into(),
        reason,
    }
}

#[async_trait]
impl Tool for FileReadTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read the full text content of a file. Relative paths resolve against the working directory."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "file_path": {
                    "type": "string",
                    "description": "Path of the file to read"
                }
            },
            "required": ["file_path"]
        })
    }

    async fn execute(&self, input: &serde_json::Value, ctx: &ToolContext) -> Result<String, ToolError> {
        let file_path = required_str(input, "file_path")?;
        let path = ctx.resolve(file_path);

        let metadata = match tokio::fs::metadata(&path).await {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(failed(format!("File not found: {file_path}")));
            }
            Err(e) => return Err(failed(format!("Cannot access {file_path}: {e}"))),
        };

        if metadata.is_dir() {
            return Err(failed(format!("Path is a directory: {file_path}")));
        }

        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| failed(format!("Failed to read {file_path}: {e}")))?;

        String::from_utf8(bytes).map_err(|_| failed(format!("File is not valid UTF-8 text: {file_path}")))
    }
}
