use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use dermadesk_core::domain::conversation::{AssistantMessage, Message, MessageContent, ToolCall};

use super::{generated_call_id, tool_declarations, trim_base_url};
use crate::llm::{ChatModel, LlmError, ToolSchema};

/// Any OpenAI-compatible `/v1/chat/completions` endpoint.
pub struct OpenAiChatModel {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f32,
}

impl OpenAiChatModel {
    pub fn new(
        client: reqwest::Client,
        api_key: String,
        base_url: String,
        model: String,
        temperature: f32,
    ) -> Self {
        Self { client, api_key, base_url: trim_base_url(&base_url), model, temperature }
    }

    fn request_body(&self, instructions: &str, history: &[Message], tools: &[ToolSchema]) -> Value {
        let mut messages = vec![json!({ "role": "system", "content": instructions })];
        messages.extend(history.iter().map(wire_message));

        let mut body = json!({
            "model": self.model,
            "messages": messages,
            "temperature": self.temperature,
        });
        if !tools.is_empty() {
            body["tools"] = Value::Array(tool_declarations(tools));
        }
        body
    }
}

fn wire_message(message: &Message) -> Value {
    match message {
        Message::System { content } => {
            json!({ "role": "system", "content": content.as_plain_text() })
        }
        Message::User { content } => json!({ "role": "user", "content": content.as_plain_text() }),
        Message::Assistant(assistant) => {
            let content = if assistant.content.is_blank() {
                Value::Null
            } else {
                Value::String(assistant.content.as_plain_text())
            };
            let mut wire = json!({ "role": "assistant", "content": content });
            if !assistant.tool_calls.is_empty() {
                // Arguments travel as a JSON-encoded string on this wire format.
                wire["tool_calls"] = assistant
                    .tool_calls
                    .iter()
                    .map(|call| {
                        json!({
                            "id": call.id,
                            "type": "function",
                            "function": {
                                "name": call.name,
                                "arguments": call.arguments.to_string(),
                            },
                        })
                    })
                    .collect();
            }
            wire
        }
        Message::ToolResult(result) => json!({
            "role": "tool",
            "tool_call_id": result.tool_call_id,
            "content": result.content,
        }),
    }
}

fn parse_arguments(raw: Option<&Value>) -> Value {
    match raw {
        Some(Value::String(encoded)) if encoded.trim().is_empty() => json!({}),
        // Unparseable arguments are kept verbatim so the executor reports them back.
        Some(Value::String(encoded)) => {
            serde_json::from_str(encoded).unwrap_or_else(|_| Value::String(encoded.clone()))
        }
        Some(other) => other.clone(),
        None => json!({}),
    }
}

fn parse_response(response: &Value) -> Result<AssistantMessage, LlmError> {
    let message = response
        .pointer("/choices/0/message")
        .ok_or_else(|| LlmError::ParseError("missing choices[0].message".into()))?;

    let content = match message.get("content") {
        Some(Value::Null) | None => MessageContent::default(),
        Some(raw) => serde_json::from_value::<MessageContent>(raw.clone())
            .map_err(|e| LlmError::ParseError(format!("choices[0].message.content: {e}")))?,
    };

    let mut tool_calls = Vec::new();
    for call in message.get("tool_calls").and_then(Value::as_array).into_iter().flatten() {
        let name = call
            .pointer("/function/name")
            .and_then(Value::as_str)
            .ok_or_else(|| LlmError::ParseError("tool call without function.name".into()))?;
        let id = call
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(generated_call_id);
        tool_calls.push(ToolCall {
            id,
            name: name.to_string(),
            arguments: parse_arguments(call.pointer("/function/arguments")),
        });
    }

    Ok(AssistantMessage::new(content, tool_calls))
}

#[async_trait]
impl ChatModel for OpenAiChatModel {
    async fn invoke(
        &self,
        instructions: &str,
        history: &[Message],
        tools: &[ToolSchema],
    ) -> Result<AssistantMessage, LlmError> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = self.request_body(instructions, history, tools);

        debug!(model = %self.model, messages = history.len(), "openai request to {url}");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
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

#[cfg(test)]
mod tests {
    use serde_json::json;

    use dermadesk_core::domain::conversation::{
        AssistantMessage, Message, ToolCall, ToolResultMessage,
    };

    use super::{parse_response, OpenAiChatModel};

    #[test]
    fn tool_calls_are_sent_with_string_arguments_and_results_reference_ids() {
        let model = OpenAiChatModel::new(
            reqwest::Client::new(),
            "sk-test".to_string(),
            "https://api.openai.com".to_string(),
            "gpt-4o-mini".to_string(),
            0.2,
        );
        let history = vec![
            Message::Assistant(AssistantMessage::with_tool_calls(vec![ToolCall {
                id: "call_a".to_string(),
                name: "remove_from_cart".to_string(),
                arguments: json!({"product_id": 3}),
            }])),
            Message::ToolResult(ToolResultMessage {
                tool_call_id: "call_a".to_string(),
                tool_name: "remove_from_cart".to_string(),
                content: "{}".to_string(),
                is_error: false,
            }),
        ];

        let body = model.request_body("instructions", &history, &[]);

        let assistant = &body["messages"][1];
        assert_eq!(assistant["content"], json!(null));
        assert_eq!(assistant["tool_calls"][0]["function"]["arguments"], "{\"product_id\":3}");
        assert_eq!(body["messages"][2]["tool_call_id"], "call_a");
        assert!(body.get("tools").is_none());
    }

    #[test]
    fn string_arguments_are_decoded_and_structured_content_is_kept() {
        let message = parse_response(&json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": [{"type": "text", "text": "Checking your cart"}],
                    "tool_calls": [{
                        "id": "call_9",
                        "type": "function",
                        "function": {"name": "add_to_cart", "arguments": "{\"product_id\": \"7\"}"}
                    }]
                }
            }]
        }))
        .expect("parse");

        assert_eq!(message.tool_calls[0].id, "call_9");
        assert_eq!(message.tool_calls[0].arguments, json!({"product_id": "7"}));
        assert_eq!(message.content.as_plain_text(), "Checking your cart");
    }

    #[test]
    fn malformed_arguments_are_preserved_for_the_executor() {
        let message = parse_response(&json!({
            "choices": [{"message": {"content": null, "tool_calls": [{
                "id": "call_x",
                "function": {"name": "view_cart", "arguments": "{not json"}
            }]}}]
        }))
        .expect("parse");

        assert_eq!(message.tool_calls[0].arguments, json!("{not json"));
    }
}
