use std::env;

use crate::pricing::{DEFAULT_INPUT_COST_PER_MILLION, DEFAULT_OUTPUT_COST_PER_MILLION, Pricing};

const DEFAULT_MODEL_PROVIDER: &str = "openai";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_MODEL_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_SYSTEM_PROMPT: &str = "You are an helpful assistant for a simple CLI chat. \
     Only respond with text messages. Get creative with the answers!";

#[derive(Clone)]
pub struct Config {
    pub model_provider: String,
    pub model: String,
    pub model_base_url: String,
    pub api_key: Option<String>,
    pub system_prompt: String,
    /// `None` leaves requests without a deadline.
    pub model_timeout_secs: Option<u64>,
    pub pricing: Pricing,
}

// Hand-written so the API key never reaches a log line.
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("model_provider", &self.model_provider)
            .field("model", &self.model)
            .field("model_base_url", &self.model_base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("system_prompt", &self.system_prompt)
            .field("model_timeout_secs", &self.model_timeout_secs)
            .field("pricing", &self.pricing)
            .finish()
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_env_with(|key| env::var(key).ok())
    }

    fn from_env_with(mut get_var: impl FnMut(&str) -> Option<String>) -> Self {
        let model_base_url = parse_non_empty(get_var("BASE_URL").as_deref())
            .unwrap_or_else(|| DEFAULT_MODEL_BASE_URL.to_string());
        let api_key = parse_non_empty(get_var("OPENAI_API_KEY").as_deref());
        let model_timeout_secs = parse_model_timeout_secs(get_var("MODEL_TIMEOUT_SECS").as_deref());
        let pricing = Pricing {
            input_per_million: parse_rate(
                get_var("INPUT_COST_PER_MILLION").as_deref(),
                DEFAULT_INPUT_COST_PER_MILLION,
            ),
            output_per_million: parse_rate(
                get_var("OUTPUT_COST_PER_MILLION").as_deref(),
                DEFAULT_OUTPUT_COST_PER_MILLION,
            ),
        };

        Self {
            model_provider: get_var("MODEL_PROVIDER")
                .unwrap_or_else(|| DEFAULT_MODEL_PROVIDER.to_string()),
            model: parse_non_empty(get_var("MODEL").as_deref())
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            model_base_url,
            api_key,
            system_prompt: get_var("SYSTEM_PROMPT")
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
            model_timeout_secs,
            pricing,
        }
    }
}

fn parse_non_empty(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn parse_model_timeout_secs(raw: Option<&str>) -> Option<u64> {
    raw.and_then(|value| value.trim().parse::<u64>().ok())
        .filter(|value| *value > 0)
}

fn parse_rate(raw: Option<&str>, default: f64) -> f64 {
    raw.and_then(|value| value.trim().parse::<f64>().ok())
        .filter(|value| value.is_finite() && *value >= 0.0)
        .unwrap_or(default)
}
