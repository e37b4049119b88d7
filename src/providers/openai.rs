use anyhow::{Context, Result, anyhow};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::Config;
use crate::model::{ChatCompletion, ChatOutcome, Message, Usage};
use crate::providers::http_errors::model_api_request_error;
use crate::tools::{self, ToolDefinition};

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    tools: &'a [ToolDefinition],
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChoiceResponse>,
    usage: Option<UsageResponse>,
}

#[derive(Debug, Deserialize)]
struct ChoiceResponse {
    message: ChatMessageResponse,
}

#[derive(Debug, Deserialize)]
struct ChatMessageResponse {
    content: Option<String>,
    tool_calls: Option<Vec<ToolCallResponse>>,
}

#[derive(Debug, Deserialize)]
struct ToolCallResponse {
    id: String,
    function: FunctionCallResponse,
}

#[derive(Debug, Deserialize)]
struct FunctionCallResponse {
    name: String,
}

#[derive(Debug, Deserialize)]
struct UsageResponse {
    prompt_tokens: u64,
    completion_tokens: u64,
}

fn chat_url(base_url: &str) -> String {
    format!("{}/chat/completions", base_url.trim_end_matches('/'))
}

fn to_openai_messages(messages: &[Message]) -> Vec<ChatMessage<'_>> {
    messages
        .iter()
        .map(|msg| ChatMessage {
            role: msg.role.as_str(),
            content: &msg.content,
        })
        .collect()
}

fn into_completion(parsed: ChatCompletionResponse) -> Result<ChatCompletion> {
    let usage = parsed
        .usage
        .map(|usage| Usage {
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
        })
        .ok_or_else(|| anyhow!("Model chat response did not include token usage"))?;
    let message = parsed
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message)
        .ok_or_else(|| anyhow!("Model chat response contained no choices"))?;

    // Only the first tool call is considered.
    let first_call = message.tool_calls.and_then(|calls| calls.into_iter().next());
    let outcome = match first_call {
        Some(call) if tools::is_termination_call(&call.function.name) => ChatOutcome::Terminate {
            content: message.content.filter(|text| !text.is_empty()),
            call_id: call.id,
        },
        Some(call) => {
            warn!(
                tool_name = %call.function.name,
                call_id = %call.id,
                "ignoring call to undeclared tool"
            );
            ChatOutcome::Reply {
                content: message.content.unwrap_or_default(),
            }
        }
        None => ChatOutcome::Reply {
            content: message.content.unwrap_or_default(),
        },
    };

    Ok(ChatCompletion { outcome, usage })
}

pub async fn chat(
    client: &Client,
    cfg: &Config,
    messages: &[Message],
    tools: &[ToolDefinition],
) -> Result<ChatCompletion> {
    let api_url = chat_url(&cfg.model_base_url);
    let body = ChatCompletionRequest {
        model: &cfg.model,
        messages: to_openai_messages(messages),
        tools,
    };
    debug!(
        api_url = %api_url,
        model = %cfg.model,
        message_count = messages.len(),
        tool_count = tools.len(),
        "sending openai chat request"
    );

    let mut request = client.post(&api_url).json(&body);
    if let Some(api_key) = &cfg.api_key {
        request = request.bearer_auth(api_key);
    }
    if let Some(secs) = cfg.model_timeout_secs {
        request = request.timeout(Duration::from_secs(secs));
    }

    let response = request.send().await.map_err(|err| {
        warn!(
            api_url = %api_url,
            model = %cfg.model,
            error = %err,
            "openai request failed"
        );
        model_api_request_error(err, &api_url, cfg.model_timeout_secs)
    })?;

    if !response.status().is_success() {
        let status = response.status();
        let response_body = response
            .text()
            .await
            .unwrap_or_else(|_| "<failed to read response body>".to_string());
        warn!(
            api_url = %api_url,
            model = %cfg.model,
            status = %status,
            response_body_len = response_body.len(),
            "openai returned non-success status"
        );
        return Err(anyhow!(
            "Model request failed with status {}: {}",
            status,
            response_body
        ));
    }

    let parsed: ChatCompletionResponse = response
        .json()
        .await
        .context("Failed to parse model chat response")?;
    let completion = into_completion(parsed)?;
    debug!(
        model = %cfg.model,
        prompt_tokens = completion.usage.prompt_tokens,
        completion_tokens = completion.usage.completion_tokens,
        terminate = matches!(completion.outcome, ChatOutcome::Terminate { .. }),
        "received openai chat response"
    );
    Ok(completion)
}
