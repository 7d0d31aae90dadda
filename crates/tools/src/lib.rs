//! Built-in tool implementations for taskloop.
//!
//! Five tools give the agent access to the local machine: read and write
//! files, run shell commands, search file contents and expand globs.

pub mod bash;
pub mod file_glob;
pub mod file_read;
pub mod file_write;
pub mod grep;
mod process;

use std::time::Duration;
use taskloop_core::error::ToolError;
use taskloop_core::tool::ToolRegistry;

pub use bash::BashTool;
pub use file_glob::GlobTool;
pub use file_read::FileReadTool;
pub use file_write::FileWriteTool;
pub use grep::GrepTool;

/// The tools offered to the model, in the order they are advertised.
pub const TOOL_CATALOG: [&str; 5] = ["read_file", "write_file", "bash", "grep", "glob"];

/// Deadlines for the tools that spawn host processes.
#[derive(Debug, Clone, Copy)]
pub struct ToolTimeouts {
    pub bash: Duration,
    pub grep: Duration,
}

impl Default for ToolTimeouts {
    fn default() -> Self {
        Self {
            bash: bash::DEFAULT_BASH_TIMEOUT,
            grep: grep::DEFAULT_GREP_TIMEOUT,
        }
    }
}

/// Create the tool registry with all built-in tools.
///
/// Fails if the registered handlers drift from [`TOOL_CATALOG`].
pub fn default_registry(timeouts: ToolTimeouts) -> Result<ToolRegistry, ToolError> {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(FileReadTool))?;
    registry.register(Box::new(FileWriteTool))?;
    registry.register(Box::new(BashTool::new(timeouts.bash)))?;
    registry.register(Box::new(GrepTool::new(timeouts.grep)))?;
    registry.register(Box::new(GlobTool))?;
    registry.verify_catalog(&TOOL_CATALOG)?;
    Ok(registry)
}
