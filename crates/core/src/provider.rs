//! Provider trait: the abstraction over the model backend.
//!
//! A Provider takes the system prompt, the tool catalog and the full
//! conversation, makes one call to the model and returns the ordered content
//! blocks, the stop reason and the token usage of that call.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::error::ProviderError;
use crate::message::{ContentBlock, Message};
use crate::usage::Usage;

/// Everything the model needs for one call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRequest {
    /// The model to use (e.g., "claude-sonnet-4-20250514")
    pub model: String,

    /// System instructions
    pub system: String,

    /// The conversation messages
    pub messages: Vec<Message>,

    /// Available tools the model can call
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,

    /// Maximum tokens to generate
    pub max_tokens: u32,

    /// Sampling temperature; provider default when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

/// A tool definition sent to the model so it knows what tools it can call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The tool name
    pub name: String,

    /// Description of what the tool does
    pub description: String,

    /// JSON Schema describing the tool's input
    pub input_schema: serde_json::Value,
}

/// Why the model stopped generating.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum StopReason {
    ToolUse,
    EndTurn,
    StopSequence,
    MaxTokens,
    /// Any value this client does not know, kept verbatim.
    Other(String),
}

impl StopReason {
    pub fn as_str(&self) -> &str {
        match self {
            Self::ToolUse => "tool_use",
            Self::EndTurn => "end_turn",
            Self::StopSequence => "stop_sequence",
            Self::MaxTokens => "max_tokens",
            Self::Other(raw) => raw,
        }
    }
}

impl From<String> for StopReason {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "tool_use" => Self::ToolUse,
            "end_turn" => Self::EndTurn,
            "stop_sequence" => Self::StopSequence,
            "max_tokens" => Self::MaxTokens,
            _ => Self::Other(raw),
        }
    }
}

impl From<StopReason> for String {
    fn from(reason: StopReason) -> Self {
        reason.as_str().to_string()
    }
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A complete response from one model call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResponse {
    /// Content blocks in exactly the order the model produced them
    pub content: Vec<ContentBlock>,

    pub stop_reason: StopReason,

    /// Token usage of this call alone
    pub usage: Usage,

    /// Which model actually responded (may differ from requested)
    pub model: String,
}

/// The core Provider trait.
///
/// Implementations make exactly one request per `complete()` and do not
/// retry; network, auth and rate-limit failures go back to the caller.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "anthropic").
    fn name(&self) -> &str;

    /// Send a request and get a complete response.
    async fn complete(&self, request: ProviderRequest) -> std::result::Result<ProviderResponse, ProviderError>;
}
