use std::sync::Arc;

use tracing::{info, warn};

use dermadesk_core::domain::conversation::{ToolCall, ToolResultMessage};

use crate::tools::{normalize_arguments, SafetyClass, ToolContext, ToolError, ToolRegistry};

/// Which tools an executor instance may run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecutionScope {
    /// Only safe tools; a sensitive name becomes a correctable error result.
    SafeOnly,
    /// Every call of a batch a human has approved.
    Approved,
}

pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
    scope: ExecutionScope,
}

impl ToolExecutor {
    pub fn safe(registry: Arc<ToolRegistry>) -> Self {
        Self { registry, scope: ExecutionScope::SafeOnly }
    }

    pub fn sensitive(registry: Arc<ToolRegistry>) -> Self {
        Self { registry, scope: ExecutionScope::Approved }
    }

    /// Runs the calls in order and returns one result per call, tagged with its id.
    /// Only fatal errors escape; anything else is reported to the model as a result.
    pub async fn execute(
        &self,
        context: &ToolContext,
        calls: &[ToolCall],
    ) -> Result<Vec<ToolResultMessage>, ToolError> {
        let mut results = Vec::with_capacity(calls.len());

        for call in calls {
            match self.execute_one(context, call).await {
                Ok(content) => {
                    info!(
                        event_name = "agent.tool.completed",
                        session_id = %context.session_id,
                        tool_call_id = %call.id,
                        tool = %call.name,
                        "tool call completed"
                    );
                    results.push(ToolResultMessage {
                        tool_call_id: call.id.clone(),
                        tool_name: call.name.clone(),
                        content,
                        is_error: false,
                    });
                }
                Err(error) if error.is_fatal() => return Err(error),
                Err(error) => {
                    warn!(
                        event_name = "agent.tool.failed",
                        session_id = %context.session_id,
                        tool_call_id = %call.id,
                        tool = %call.name,
                        error = %error,
                        "tool call failed; reporting to model"
                    );
                    results.push(error_result(call, &error));
                }
            }
        }

        Ok(results)
    }

    async fn execute_one(
        &self,
        context: &ToolContext,
        call: &ToolCall,
    ) -> Result<String, ToolError> {
        let tool = self
            .registry
            .get(&call.name)
            .ok_or_else(|| ToolError::Validation(format!("unknown tool `{}`", call.name)))?;

        if self.scope == ExecutionScope::SafeOnly && tool.safety() == SafetyClass::Sensitive {
            return Err(ToolError::Validation(format!(
                "`{}` changes the cart and must be requested on its own for user approval",
                call.name
            )));
        }

        let arguments = normalize_arguments(call.arguments.clone())?;
        let output = tool.execute(context, arguments).await?;
        Ok(output.to_string())
    }
}

pub fn error_result(call: &ToolCall, error: &ToolError) -> ToolResultMessage {
    ToolResultMessage {
        tool_call_id: call.id.clone(),
        tool_name: call.name.clone(),
        content: format!("Error: {error}. please fix your mistakes."),
        is_error: true,
    }
}
