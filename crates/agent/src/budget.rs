//! Per-turn limits on model calls and estimated spend.

use serde::{Deserialize, Serialize};
use taskloop_core::usage::{Usage, UsageCounters};

/// Cache writes bill at 1.25x the input price, cache reads at 0.1x.
const CACHE_WRITE_MULTIPLIER: f64 = 1.25;
const CACHE_READ_MULTIPLIER: f64 = 0.1;

/// Per-million-token pricing for a model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelPricing {
    /// Price per 1M input tokens in USD.
    pub input_per_m: f64,
    /// Price per 1M output tokens in USD.
    pub output_per_m: f64,
}

impl ModelPricing {
    pub fn new(input_per_m: f64, output_per_m: f64) -> Self {
        Self {
            input_per_m,
            output_per_m,
        }
    }

    /// Compute cost in USD for the given usage.
    pub fn cost(&self, usage: &Usage) -> f64 {
        let input = usage.input_tokens as f64 * self.input_per_m
            + usage.cache_creation_input_tokens as f64 * self.input_per_m * CACHE_WRITE_MULTIPLIER
            + usage.cache_read_input_tokens as f64 * self.input_per_m * CACHE_READ_MULTIPLIER;
        let output = usage.output_tokens as f64 * self.output_per_m;
        (input + output) / 1_000_000.0
    }
}

impl Default for ModelPricing {
    fn default() -> Self {
        Self::new(3.0, 15.0)
    }
}

/// Stops a turn that keeps calling tools without finishing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TurnBudget {
    pub max_iterations: u32,
    pub max_cost_usd: Option<f64>,
    pub pricing: ModelPricing,
}

impl TurnBudget {
    /// Reason to stop before making another model call, if any.
    pub fn exceeded(&self, usage: &UsageCounters) -> Option<String> {
        if usage.calls() >= self.max_iterations {
            return Some(format!(
                "[Stopped: reached the limit of {} model calls for this turn]",
                self.max_iterations
            ));
        }

        if let Some(max) = self.max_cost_usd {
            let spent = self.pricing.cost(&usage.total());
            if spent >= max {
                return Some(format!(
                    "[Stopped: estimated cost ${spent:.4} reached the turn budget of ${max:.2}]"
                ));
            }
        }

        None
    }
}

impl Default for TurnBudget {
    fn default() -> Self {
        Self {
            max_iterations: 25,
            max_cost_usd: Some(1.0),
            pricing: ModelPricing::default(),
        }
    }
}
