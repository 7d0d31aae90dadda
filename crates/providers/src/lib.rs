//! Model provider implementations for taskloop.
//!
//! All providers implement the `taskloop_core::Provider` trait.

pub mod anthropic;

pub use anthropic::AnthropicProvider;
