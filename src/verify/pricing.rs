use serde::{Deserialize, Serialize};

use super::types::Usage;
use crate::constants::{
    DEFAULT_EXCHANGE_RATE, DEFAULT_INPUT_PRICE_PER_MILLION, DEFAULT_OUTPUT_PRICE_PER_MILLION,
};
use crate::governor::Cost;

/// Per-unit prices in the service's billing currency plus a fixed conversion rate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pricing {
    pub input_per_million: f64,
    pub output_per_million: f64,
    /// Billing currency → reporting currency.
    pub exchange_rate: f64,
}

impl Default for Pricing {
    fn default() -> Self {
        Self {
            input_per_million: DEFAULT_INPUT_PRICE_PER_MILLION,
            output_per_million: DEFAULT_OUTPUT_PRICE_PER_MILLION,
            exchange_rate: DEFAULT_EXCHANGE_RATE,
        }
    }
}

impl Pricing {
    /// Cost of one call in the reporting currency.
    pub fn cost(&self, usage: &Usage) -> Cost {
        let billed = usage.input_units as f64 * self.input_per_million
            + usage.output_units as f64 * self.output_per_million;
        Cost::from_amount(billed / 1_000_000.0 * self.exchange_rate)
    }
}
