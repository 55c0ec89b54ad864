use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use dermadesk_core::domain::conversation::{AssistantMessage, Message};

/// A tool as declared to the model: name, description and JSON input schema.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// Chat backend able to answer with text, tool calls, or both.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn invoke(
        &self,
        instructions: &str,
        history: &[Message],
        tools: &[ToolSchema],
    ) -> Result<AssistantMessage, LlmError>;
}

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("API error: {status}: {body}")]
    ApiError { status: u16, body: String },
    #[error("failed to parse response: {0}")]
    ParseError(String),
    #[error("provider not configured: {0}")]
    NotConfigured(String),
}
