//! The turn state machine.
//!
//! A turn starts in `Calling`. Each model response moves it with [`transition`],
//! a pure function of the response. `Dispatching` goes back to `Calling` once
//! the tool results are appended. Everything else is terminal.

use taskloop_core::message::join_text;
use taskloop_core::provider::{ProviderResponse, StopReason};
use taskloop_core::tool::ToolCall;

/// Appended to the answer when the model ran out of output tokens.
pub const TRUNCATION_MARKER: &str = "[Response truncated: maximum output tokens reached]";

#[derive(Debug, Clone)]
pub enum LoopState {
    /// Waiting on the model.
    Calling,
    /// Tool calls to run, in the order the model asked for them.
    Dispatching(Vec<ToolCall>),
    /// The model finished normally.
    Done(String),
    /// The model hit its output limit.
    Truncated(String),
    /// The model stopped for a reason this loop does not handle.
    Unexpected(String),
    /// The turn used up its call or spend allowance.
    BudgetExceeded(String),
}

impl LoopState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Calling | Self::Dispatching(_))
    }
}

/// Next state for a model response.
///
/// A `tool_use` stop with no tool blocks yields `Calling`; the caller decides
/// how often it tolerates that.
pub fn transition(response: &ProviderResponse) -> LoopState {
    match &response.stop_reason {
        StopReason::ToolUse => {
            let calls: Vec<ToolCall> = response
                .content
                .iter()
                .filter_map(ToolCall::from_block)
                .collect();
            if calls.is_empty() {
                LoopState::Calling
            } else {
                LoopState::Dispatching(calls)
            }
        }
        StopReason::EndTurn | StopReason::StopSequence => LoopState::Done(join_text(&response.content)),
        StopReason::MaxTokens => {
            let text = join_text(&response.content);
            if text.is_empty() {
                LoopState::Truncated(TRUNCATION_MARKER.into())
            } else {
                LoopState::Truncated(format!("{text}\n\n{TRUNCATION_MARKER}"))
            }
        }
        StopReason::Other(raw) => {
            let text = join_text(&response.content);
            if text.is_empty() {
                LoopState::Unexpected(unexpected_placeholder(raw))
            } else {
                LoopState::Unexpected(text)
            }
        }
    }
}

pub(crate) fn unexpected_placeholder(reason: &str) -> String {
    format!("[Model stopped unexpectedly: {reason}]")
}
