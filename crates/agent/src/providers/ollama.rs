use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use dermadesk_core::domain::conversation::{AssistantMessage, Message, MessageContent, ToolCall};

use super::{generated_call_id, tool_declarations, trim_base_url};
use crate::llm::{ChatModel, LlmError, ToolSchema};

/// Ollama `/api/chat` with native tool calling.
pub struct OllamaChatModel {
    client: reqwest::Client,
    url: String,
    model: String,
    temperature: f32,
}

impl OllamaChatModel {
    pub fn new(client: reqwest::Client, url: String, model: String, temperature: f32) -> Self {
        Self { client, url: trim_base_url(&url), model, temperature }
    }

    fn request_body(&self, instructions: &str, history: &[Message], tools: &[ToolSchema]) -> Value {
        let mut messages = vec![json!({ "role": "system", "content": instructions })];
        messages.extend(history.iter().map(wire_message));

        json!({
            "model": self.model,
            "messages": messages,
            "tools": tool_declarations(tools),
            "stream": false,
            "options": {
                "temperature": self.temperature,
            },
        })
    }
}

fn wire_message(message: &Message) -> Value {
    match message {
        Message::System { content } => {
            json!({ "role": "system", "content": content.as_plain_text() })
        }
        Message::User { content } => json!({ "role": "user", "content": content.as_plain_text() }),
        Message::Assistant(assistant) => {
            let mut wire = json!({
                "role": "assistant",
                "content": assistant.content.as_plain_text(),
            });
            if !assistant.tool_calls.is_empty() {
                wire["tool_calls"] = assistant
                    .tool_calls
                    .iter()
                    .map(|call| {
                        json!({
                            "function": { "name": call.name, "arguments": call.arguments },
                        })
                    })
                    .collect();
            }
            wire
        }
        Message::ToolResult(result) => json!({
            "role": "tool",
            "tool_name": result.tool_name,
            "content": result.content,
        }),
    }
}

fn parse_response(response: &Value) -> Result<AssistantMessage, LlmError> {
    let message = response
        .get("message")
        .ok_or_else(|| LlmError::ParseError("missing message".into()))?;

    let content = match message.get("content") {
        Some(Value::Null) | None => MessageContent::default(),
        Some(raw) => serde_json::from_value::<MessageContent>(raw.clone())
            .map_err(|e| LlmError::ParseError(format!("message.content: {e}")))?,
    };

    let tool_calls = message
        .get("tool_calls")
        .and_then(Value::as_array)
        .map(|calls| {
            calls
                .iter()
                .map(|call| {
                    let function = &call["function"];
                    let name = function["name"]
                        .as_str()
                        .ok_or_else(|| LlmError::ParseError("tool call without name".into()))?;
                    let id = call
                        .get("id")
                        .and_then(Value::as_str)
                        .map(str::to_string)
                        .unwrap_or_else(generated_call_id);
                    Ok(ToolCall {
                        id,
                        name: name.to_string(),
                        arguments: function.get("arguments").cloned().unwrap_or(Value::Null),
                    })
                })
                .collect::<Result<Vec<_>, LlmError>>()
        })
        .transpose()?
        .unwrap_or_default();

    Ok(AssistantMessage::new(content, tool_calls))
}

#[async_trait]
impl ChatModel for OllamaChatModel {
    async fn invoke(
        &self,
        instructions: &str,
        history: &[Message],
        tools: &[ToolSchema],
    ) -> Result<AssistantMessage, LlmError> {
        let url = format!("{}/api/chat", self.url);
        let body = self.request_body(instructions, history, tools);

        debug!(model = %self.model, messages = history.len(), "ollama request to {url}");

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status().as_u16();
        if status != 200 {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::ApiError { status, body });
        }

        let resp: Value = response.json().await?;
        parse_response(&resp)
    }
}
