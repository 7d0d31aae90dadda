//! The agent loop: ask the model, run the tools it asks for, repeat.
//!
//! A turn follows a **Call → Dispatch → Call** cycle:
//!
//! 1. **Receive** the user's input and append it to the conversation
//! 2. **Call** the model with the system prompt, tool catalog and full history
//! 3. **If tool requests**: run each tool, append all results as one message, go to 2
//! 4. **Otherwise**: return the model's text with the turn's token usage
//!
//! The loop also stops when the turn budget (model calls or estimated
//! spend) runs out.

pub mod budget;
pub mod loop_runner;
pub mod state;

#[cfg(test)]
mod test_helpers;

pub use budget::{ModelPricing, TurnBudget};
pub use loop_runner::{Agent, INTERRUPTED_TOOL_RESULT, TurnOutcome, TurnStatus};
pub use state::{LoopState, TRUNCATION_MARKER, transition};
