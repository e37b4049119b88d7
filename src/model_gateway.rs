use anyhow::Result;
use reqwest::Client;
use std::future::Future;
use std::pin::Pin;

use crate::config::Config;
use crate::model::{self, ChatCompletion, Message};
use crate::tools::ToolDefinition;

pub struct ModelGatewayRequest {
    pub messages: Vec<Message>,
    pub tools: Vec<ToolDefinition>,
}

pub type ModelGatewayFuture<'a> = Pin<Box<dyn Future<Output = Result<ChatCompletion>> + 'a>>;

/// The one capability the conversation loop needs from the outside world.
pub trait ModelGateway {
    fn chat<'a>(&'a self, request: ModelGatewayRequest) -> ModelGatewayFuture<'a>;
}

type ModelChatFuture<'a> = Pin<Box<dyn Future<Output = Result<ChatCompletion>> + 'a>>;

trait ChatBackend {
    fn chat<'a>(
        &'a self,
        client: &'a Client,
        cfg: &'a Config,
        messages: &'a [Message],
        tools: &'a [ToolDefinition],
    ) -> ModelChatFuture<'a>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ProviderChatBackend;

impl ChatBackend for ProviderChatBackend {
    fn chat<'a>(
        &'a self,
        client: &'a Client,
        cfg: &'a Config,
        messages: &'a [Message],
        tools: &'a [ToolDefinition],
    ) -> ModelChatFuture<'a> {
        Box::pin(async move { model::chat(client, cfg, messages, tools).await })
    }
}

/// Gateway backed by the configured hosted provider.
pub struct HostModelGateway<'a, B = ProviderChatBackend> {
    client: &'a Client,
    cfg: &'a Config,
    backend: B,
}

impl<'a> HostModelGateway<'a, ProviderChatBackend> {
    pub fn new(client: &'a Client, cfg: &'a Config) -> Self {
        Self {
            client,
            cfg,
            backend: ProviderChatBackend,
        }
    }
}

impl<'a, B> HostModelGateway<'a, B> {
    #[cfg(test)]
    fn with_backend(client: &'a Client, cfg: &'a Config, backend: B) -> Self {
        Self {
            client,
            cfg,
            backend,
        }
    }
}

impl<'a, B> ModelGateway for HostModelGateway<'a, B>
where
    B: ChatBackend,
{
    fn chat<'b>(&'b self, request: ModelGatewayRequest) -> ModelGatewayFuture<'b> {
        Box::pin(async move {
            self.backend
                .chat(self.client, self.cfg, &request.messages, &request.tools)
                .await
        })
    }
}
