//! # taskloop core
//!
//! Domain types, traits, and error definitions for the taskloop agent.
//! This crate has **no framework dependencies**: it defines the domain model
//! that the provider, tool and agent crates implement against.
//!
//! - [`message`]: conversations, messages and content blocks
//! - [`provider`]: the model client trait and its request/response types
//! - [`tool`]: the tool trait, execution context and name-keyed registry
//! - [`usage`]: per-call token usage and the per-turn accumulator

pub mod error;
pub mod message;
pub mod provider;
pub mod tool;
pub mod usage;

// Re-export key types at crate root for ergonomics
pub use error::{Error, ProviderError, Result, ToolError};
pub use message::{ContentBlock, Conversation, ConversationId, Message, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, StopReason, ToolDefinition};
pub use tool::{Tool, ToolCall, ToolContext, ToolRegistry, ToolResultRecord};
pub use usage::{Usage, UsageCounters};
