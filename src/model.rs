use anyhow::{Result, anyhow};
use reqwest::Client;
use tracing::{debug, warn};

use crate::config::Config;
use crate::providers;
use crate::tools::ToolDefinition;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// Token counts reported by the service for one request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Usage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatOutcome {
    Reply {
        content: String,
    },
    /// The model called `end_chat`; `content` is whatever text came with the call.
    Terminate {
        content: Option<String>,
        call_id: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatCompletion {
    pub outcome: ChatOutcome,
    pub usage: Usage,
}

pub async fn chat(
    client: &Client,
    cfg: &Config,
    messages: &[Message],
    tools: &[ToolDefinition],
) -> Result<ChatCompletion> {
    let provider = cfg.model_provider.trim().to_ascii_lowercase();

    match provider.as_str() {
        "openai" => {
            debug!(
                provider = "openai",
                model = %cfg.model,
                message_count = messages.len(),
                tool_count = tools.len(),
                "dispatching model chat request"
            );
            providers::openai::chat(client, cfg, messages, tools).await
        }
        other => {
            warn!(provider = %other, "unsupported model provider configured");
            Err(anyhow!(
                "Unsupported MODEL_PROVIDER='{}'. Supported providers: openai.",
                other
            ))
        }
    }
}
