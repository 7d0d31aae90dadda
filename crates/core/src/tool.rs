//! Tool trait and the registry that dispatches tool calls by name.
//!
//! Tools give the agent the ability to act on the local machine: read and
//! write files, run shell commands, search file contents and expand globs.
//! The registry is built once at startup and is immutable afterwards.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use crate::error::ToolError;
use crate::message::ContentBlock;
use crate::provider::ToolDefinition;

/// A request to execute a tool, taken from a `ToolUse` block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// The tool_use id this call answers to
    pub id: String,

    /// Name of the tool to execute
    pub name: String,

    /// Input as a JSON object of named fields
    pub input: serde_json::Value,
}

impl ToolCall {
    /// Extract a call from a `ToolUse` block; `None` for any other block.
    pub fn from_block(block: &ContentBlock) -> Option<Self> {
        match block {
            ContentBlock::ToolUse { id, name, input } => Some(Self {
                id: id.clone(),
                name: name.clone(),
                input: input.clone(),
            }),
            _ => None,
        }
    }
}

/// The text produced for one tool call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResultRecord {
    pub tool_use_id: String,
    pub text: String,
    /// True when the tool failed. Never inferred from `text`.
    #[serde(default)]
    pub is_error: bool,
}

impl ToolResultRecord {
    pub fn is_error(&self) -> bool {
        self.is_error
    }
}

impl From<ToolResultRecord> for ContentBlock {
    fn from(record: ToolResultRecord) -> Self {
        ContentBlock::ToolResult {
            tool_use_id: record.tool_use_id,
            content: record.text,
            is_error: record.is_error,
        }
    }
}

/// Execution environment handed to every tool call.
///
/// Relative paths and shell commands resolve against `working_dir` instead of
/// the process-wide current directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolContext {
    pub working_dir: PathBuf,
}

impl ToolContext {
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
        }
    }

    /// Resolve a user-supplied path against the working directory.
    pub fn resolve(&self, path: &str) -> PathBuf {
        let p = Path::new(path);
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.working_dir.join(p)
        }
    }
}

/// Fetch a required string field from a tool input object.
pub fn required_str<'a>(input: &'a serde_json::Value, field: &str) -> Result<&'a str, ToolError> {
    input[field]
        .as_str()
        .ok_or_else(|| ToolError::InvalidArguments(format!("Missing '{field}' argument")))
}

/// Fetch an optional string field from a tool input object.
pub fn optional_str<'a>(input: &'a serde_json::Value, field: &str) -> Option<&'a str> {
    input[field].as_str().filter(|s| !s.is_empty())
}

/// The core Tool trait.
///
/// Each of read_file, write_file, bash, grep and glob implements this trait.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "bash", "read_file").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the model).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's input.
    fn input_schema(&self) -> serde_json::Value;

    /// Execute the tool and return its plain-text output.
    async fn execute(
        &self,
        input: &serde_json::Value,
        ctx: &ToolContext,
    ) -> std::result::Result<String, ToolError>;

    /// Convert this tool into a ToolDefinition for sending to the model.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: self.input_schema(),
        }
    }
}

/// An ordered table of tools keyed by exact name.
///
/// The agent loop uses this to:
/// 1. Get tool definitions to send to the model, in registration order
/// 2. Dispatch tool calls, turning every failure into `Error: ...` text
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// Register a tool. A second tool with the same name is rejected.
    pub fn register(&mut self, tool: Box<dyn Tool>) -> Result<(), ToolError> {
        if self.get(tool.name()).is_some() {
            return Err(ToolError::Registry(format!(
                "tool '{}' registered twice",
                tool.name()
            )));
        }
        self.tools.push(tool);
        Ok(())
    }

    /// Get a tool by exact name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools
            .iter()
            .find(|t| t.name() == name)
            .map(|t| t.as_ref())
    }

    /// Get all tool definitions (for sending to the model).
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.to_definition()).collect()
    }

    /// List all registered tool names, in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Check that the registered handlers are exactly the declared catalog.
    pub fn verify_catalog(&self, declared: &[&str]) -> Result<(), ToolError> {
        let registered = self.names();
        if registered != declared {
            return Err(ToolError::Registry(format!(
                "declared tools {declared:?} but handlers are registered for {registered:?}"
            )));
        }
        Ok(())
    }

    /// Execute a tool call, surfacing failures as `ToolError`.
    pub async fn execute(
        &self,
        call: &ToolCall,
        ctx: &ToolContext,
    ) -> std::result::Result<String, ToolError> {
        let tool = self
            .get(&call.name)
            .ok_or_else(|| ToolError::NotFound(call.name.clone()))?;
        tool.execute(&call.input, ctx).await
    }

    /// Execute a tool call and always produce text for the model.
    pub async fn dispatch(&self, call: &ToolCall, ctx: &ToolContext) -> ToolResultRecord {
        debug!(tool = %call.name, id = %call.id, "Dispatching tool call");

        let (text, is_error) = match self.execute(call, ctx).await {
            Ok(output) => (output, false),
            Err(e) => {
                warn!(tool = %call.name, error = %e, "Tool execution failed");
                (format!("Error: {e}"), true)
            }
        };

        ToolResultRecord {
            tool_use_id: call.id.clone(),
            text,
            is_error,
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
