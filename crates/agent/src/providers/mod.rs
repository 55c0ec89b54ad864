use std::sync::Arc;
use std::time::Duration;

use secrecy::ExposeSecret;
use serde_json::{json, Value};
use uuid::Uuid;

use dermadesk_core::config::{LlmConfig, LlmProvider};

use crate::llm::{ChatModel, LlmError, ToolSchema};

pub mod ollama;
pub mod openai;

pub use ollama::OllamaChatModel;
pub use openai::OpenAiChatModel;

/// Builds the configured backend. Config validation already requires an API key for
/// OpenAI; it is re-checked here for callers that skip validation.
pub fn build_chat_model(config: &LlmConfig) -> Result<Arc<dyn ChatModel>, LlmError> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs.max(1)))
        .build()?;

    match config.provider {
        LlmProvider::Ollama => Ok(Arc::new(OllamaChatModel::new(
            client,
            config.endpoint().to_string(),
            config.model.clone(),
            config.temperature,
        ))),
        LlmProvider::OpenAi => {
            let api_key = config
                .api_key
                .as_ref()
                .map(|key| key.expose_secret().to_string())
                .ok_or_else(|| LlmError::NotConfigured("llm.api_key for openai".to_string()))?;
            Ok(Arc::new(OpenAiChatModel::new(
                client,
                api_key,
                config.endpoint().to_string(),
                config.model.clone(),
                config.temperature,
            )))
        }
    }
}

/// Function-calling tool declarations, shared by both wire formats.
pub(crate) fn tool_declarations(tools: &[ToolSchema]) -> Vec<Value> {
    tools
        .iter()
        .map(|tool| {
            json!({
                "type": "function",
                "function": {
                    "name": tool.name,
                    "description": tool.description,
                    "parameters": tool.input_schema,
                },
            })
        })
        .collect()
}

pub(crate) fn generated_call_id() -> String {
    format!("call_{}", Uuid::new_v4().simple())
}

pub(crate) fn trim_base_url(base_url: &str) -> String {
    base_url.trim_end_matches('/').to_string()
}
