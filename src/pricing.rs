use crate::model::Usage;

/// USD per one million prompt tokens for gpt-4o-mini.
pub const DEFAULT_INPUT_COST_PER_MILLION: f64 = 0.150;
/// USD per one million completion tokens for gpt-4o-mini.
pub const DEFAULT_OUTPUT_COST_PER_MILLION: f64 = 0.600;

const TOKENS_PER_MILLION: f64 = 1_000_000.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pricing {
    pub input_per_million: f64,
    pub output_per_million: f64,
}

impl Default for Pricing {
    fn default() -> Self {
        Self {
            input_per_million: DEFAULT_INPUT_COST_PER_MILLION,
            output_per_million: DEFAULT_OUTPUT_COST_PER_MILLION,
        }
    }
}

impl Pricing {
    pub fn cost_of(&self, input_tokens: u64, output_tokens: u64) -> f64 {
        (input_tokens as f64 / TOKENS_PER_MILLION) * self.input_per_million
            + (output_tokens as f64 / TOKENS_PER_MILLION) * self.output_per_million
    }

    pub fn cost(&self, usage: &Usage) -> f64 {
        self.cost_of(usage.prompt_tokens, usage.completion_tokens)
    }
}

/// Cost in USD of one request at the default rates.
pub fn calculate_cost(input_tokens: u64, output_tokens: u64) -> f64 {
    Pricing::default().cost_of(input_tokens, output_tokens)
}

pub fn format_cost(cost: f64) -> String {
    format!("{cost:.6}")
}
