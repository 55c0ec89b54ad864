use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use dermadesk_core::domain::session::SessionId;
use dermadesk_core::errors::DomainError;
use dermadesk_db::repositories::RepositoryError;

use crate::llm::ToolSchema;

/// Whether a tool may run without a human decision.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SafetyClass {
    Safe,
    Sensitive,
}

/// Per-invocation context: the session, which also owns the cart.
#[derive(Clone, Debug)]
pub struct ToolContext {
    pub session_id: SessionId,
}

impl ToolContext {
    pub fn new(session_id: SessionId) -> Self {
        Self { session_id }
    }

    pub fn owner(&self) -> Result<&SessionId, ToolError> {
        self.session_id.owner().map_err(ToolError::from)?;
        Ok(&self.session_id)
    }
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    fn safety(&self) -> SafetyClass;
    fn input_schema(&self) -> Value;
    async fn execute(&self, context: &ToolContext, input: Value) -> Result<Value, ToolError>;

    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: self.input_schema(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("invalid input: {0}")]
    Validation(String),
    #[error("execution failed: {0}")]
    Execution(String),
    #[error("session identity is missing; cart tools need an owner")]
    MissingSessionIdentity,
    #[error("catalog store unavailable: {0}")]
    Store(#[source] RepositoryError),
}

impl ToolError {
    /// Fatal errors abort the turn; everything else is reported back to the model.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::MissingSessionIdentity | Self::Store(_))
    }
}

impl From<RepositoryError> for ToolError {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::Decode(message) => Self::Execution(message),
            unavailable => Self::Store(unavailable),
        }
    }
}

impl From<DomainError> for ToolError {
    fn from(error: DomainError) -> Self {
        match error {
            DomainError::MissingSessionIdentity => Self::MissingSessionIdentity,
            other => Self::Execution(other.to_string()),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("tool with name '{0}' is already registered")]
    DuplicateName(String),
}

/// Immutable after startup; shared read-only behind an `Arc`.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: impl Tool + 'static) -> Result<(), RegistryError> {
        if self.get(tool.name()).is_some() {
            return Err(RegistryError::DuplicateName(tool.name().to_string()));
        }
        self.tools.push(Arc::new(tool));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.iter().find(|tool| tool.name() == name).cloned()
    }

    /// Declarations in registration order.
    pub fn schemas(&self) -> Vec<ToolSchema> {
        self.tools.iter().map(|tool| tool.schema()).collect()
    }

    pub fn is_sensitive(&self, name: &str) -> bool {
        self.get(name).is_some_and(|tool| tool.safety() == SafetyClass::Sensitive)
    }

    pub fn names(&self, safety: SafetyClass) -> Vec<&'static str> {
        self.tools.iter().filter(|tool| tool.safety() == safety).map(|tool| tool.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// Arguments as an object; models sometimes send the object JSON-encoded or send nothing.
pub fn normalize_arguments(input: Value) -> Result<Value, ToolError> {
    match input {
        Value::Null => Ok(Value::Object(Default::default())),
        Value::Object(_) => Ok(input),
        Value::String(encoded) if encoded.trim().is_empty() => {
            Ok(Value::Object(Default::default()))
        }
        Value::String(encoded) => match serde_json::from_str::<Value>(&encoded) {
            Ok(parsed @ Value::Object(_)) => Ok(parsed),
            _ => Err(ToolError::Validation(format!("arguments are not a JSON object: {encoded}"))),
        },
        other => Err(ToolError::Validation(format!("arguments are not a JSON object: {other}"))),
    }
}

pub fn required_str(input: &Value, field: &str) -> Result<String, ToolError> {
    match input.get(field) {
        Some(Value::String(value)) => Ok(value.clone()),
        Some(Value::Number(value)) => Ok(value.to_string()),
        Some(Value::Null) | None => {
            Err(ToolError::Validation(format!("missing required field `{field}`")))
        }
        Some(other) => {
            Err(ToolError::Validation(format!("`{field}` must be a string, got {other}")))
        }
    }
}

/// Integers are accepted as JSON numbers, integral floats, or numeric strings.
pub fn optional_i64(input: &Value, field: &str) -> Result<Option<i64>, ToolError> {
    match input.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(number)) => {
            if let Some(value) = number.as_i64() {
                return Ok(Some(value));
            }
            match number.as_f64() {
                Some(value) if value.fract() == 0.0 && value.abs() < i64::MAX as f64 => {
                    Ok(Some(value as i64))
                }
                _ => Err(not_an_integer(field, number)),
            }
        }
        Some(Value::String(raw)) => {
            let trimmed = raw.trim();
            if let Ok(value) = trimmed.parse::<i64>() {
                return Ok(Some(value));
            }
            match trimmed.parse::<f64>() {
                Ok(value) if value.fract() == 0.0 && value.abs() < i64::MAX as f64 => {
                    Ok(Some(value as i64))
                }
                _ => Err(not_an_integer(field, raw)),
            }
        }
        Some(other) => Err(not_an_integer(field, other)),
    }
}

fn not_an_integer(field: &str, raw: impl std::fmt::Display) -> ToolError {
    ToolError::Validation(format!("`{field}` must be an integer, got {raw}"))
}

pub fn required_i64(input: &Value, field: &str) -> Result<i64, ToolError> {
    optional_i64(input, field)?
        .ok_or_else(|| ToolError::Validation(format!("missing required field `{field}`")))
}
