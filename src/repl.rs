use anyhow::Result;
use reqwest::Client;
use std::io;

use crate::config::Config;
use crate::conversation::ConversationLoop;
use crate::model_gateway::HostModelGateway;

pub async fn run_repl(client: &Client, cfg: &Config) -> Result<()> {
    let gateway = HostModelGateway::new(client, cfg);
    let mut conversation = ConversationLoop::new(gateway, cfg.system_prompt.clone(), cfg.pricing);

    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut output = io::stdout();
    conversation.run(&mut input, &mut output).await
}
