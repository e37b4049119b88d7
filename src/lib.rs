pub mod config;
pub mod conversation;
pub mod logging;
pub mod model;
pub mod model_gateway;
pub mod pricing;
pub mod providers;
pub mod repl;
pub mod tools;

use anyhow::{Context, Result};
use reqwest::Client;
use tracing::info;

use config::Config;
use repl::run_repl;

pub async fn run() -> Result<()> {
    dotenvy::dotenv().ok();
    let _log_guard = logging::init();

    let cfg = Config::from_env();
    info!(
        provider = %cfg.model_provider,
        model = %cfg.model,
        base_url = %cfg.model_base_url,
        api_key_set = cfg.api_key.is_some(),
        timeout_secs = ?cfg.model_timeout_secs,
        input_cost_per_million = cfg.pricing.input_per_million,
        output_cost_per_million = cfg.pricing.output_per_million,
        "loaded runtime configuration"
    );

    let client = Client::builder()
        .build()
        .context("Failed to initialize HTTP client")?;

    run_repl(&client, &cfg).await
}
