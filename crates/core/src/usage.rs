//! Token usage of a single model call, and the per-turn accumulator.

use serde::{Deserialize, Serialize};

/// Token counts reported for one model call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    #[serde(default)]
    pub cache_creation_input_tokens: u64,
    #[serde(default)]
    pub cache_read_input_tokens: u64,
}

impl Usage {
    pub fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            input_tokens,
            output_tokens,
            ..Self::default()
        }
    }

    pub fn total_tokens(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

/// Running totals across every model call of one user turn.
///
/// Only grows. A fresh value is created for each turn and dropped once it
/// has been reported.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageCounters {
    total: Usage,
    calls: u32,
}

impl UsageCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, usage: &Usage) {
        self.total.input_tokens += usage.input_tokens;
        self.total.output_tokens += usage.output_tokens;
        self.total.cache_creation_input_tokens += usage.cache_creation_input_tokens;
        self.total.cache_read_input_tokens += usage.cache_read_input_tokens;
        self.calls += 1;
    }

    pub fn total(&self) -> Usage {
        self.total
    }

    /// Number of model calls folded in so far.
    pub fn calls(&self) -> u32 {
        self.calls
    }
}
