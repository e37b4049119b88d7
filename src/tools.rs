use serde::Serialize;
use serde_json::{Value, json};

pub const END_CHAT_TOOL_NAME: &str = "end_chat";

/// A function the model may call, in the chat-completions `tools` shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDefinition {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub function: FunctionDefinition,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: Value,
}

/// Lets the model end the session when the user asks to leave.
pub fn end_chat() -> ToolDefinition {
    ToolDefinition {
        kind: "function",
        function: FunctionDefinition {
            name: END_CHAT_TOOL_NAME,
            description: "Ends the chat session when the user wants to exit or terminate the conversation",
            parameters: json!({
                "type": "object",
                "properties": {},
                "required": []
            }),
        },
    }
}

pub fn is_termination_call(function_name: &str) -> bool {
    function_name.trim() == END_CHAT_TOOL_NAME
}
