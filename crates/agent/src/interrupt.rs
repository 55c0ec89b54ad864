use std::sync::Arc;

use tracing::info;

use dermadesk_core::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use dermadesk_core::domain::checkpoint::Checkpoint;
use dermadesk_core::domain::conversation::{ToolCall, ToolResultMessage};
use dermadesk_core::domain::session::SessionId;
use dermadesk_core::flows::{FlowEvent, FlowState};
use dermadesk_db::repositories::CheckpointRepository;

use crate::errors::AgentError;

/// A human's answer to a suspended sensitive action.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Decision {
    Approve,
    Deny { reason: String },
}

impl Decision {
    /// Console convention: exactly `y` approves, any other line is the denial reason,
    /// kept as typed apart from its line ending.
    pub fn from_console_input(input: &str) -> Self {
        if input.trim() == "y" {
            return Self::Approve;
        }
        let line = input.strip_suffix('\n').unwrap_or(input);
        let line = line.strip_suffix('\r').unwrap_or(line);
        Self::Deny { reason: line.to_string() }
    }

    pub fn to_event(&self) -> FlowEvent {
        match self {
            Self::Approve => FlowEvent::ApprovalGranted,
            Self::Deny { reason } => FlowEvent::ApprovalDenied { reason: reason.clone() },
        }
    }
}

pub fn denial_text(reason: &str) -> String {
    format!(
        "API call denied by user. Reasoning: '{reason}'. Continue assisting, accounting for the user's input."
    )
}

/// Owns the durable side of the human gate: suspended checkpoints, the pending call set,
/// and the audit trail of decisions.
pub struct InterruptController {
    checkpoints: Arc<dyn CheckpointRepository>,
    audit: Arc<dyn AuditSink>,
}

impl InterruptController {
    pub fn new(checkpoints: Arc<dyn CheckpointRepository>, audit: Arc<dyn AuditSink>) -> Self {
        Self { checkpoints, audit }
    }

    pub async fn load(&self, session_id: &SessionId) -> Result<Option<Checkpoint>, AgentError> {
        Ok(self.checkpoints.load(session_id).await?)
    }

    /// Saves the checkpoint. Entering `AwaitingApproval` first captures the unanswered
    /// calls of the latest assistant message as the pending set.
    pub async fn persist(
        &self,
        checkpoint: &mut Checkpoint,
        audit: &AuditContext,
    ) -> Result<(), AgentError> {
        if checkpoint.flow_state == FlowState::AwaitingApproval {
            checkpoint.pending_tool_calls = checkpoint.conversation.unanswered_tool_calls();
        }
        checkpoint.touch();
        self.checkpoints.save(checkpoint).await?;

        if checkpoint.flow_state == FlowState::AwaitingApproval {
            info!(
                event_name = "agent.interrupt.suspended",
                session_id = %checkpoint.session_id,
                pending = checkpoint.pending_tool_calls.len(),
                "awaiting human approval"
            );
            self.audit.emit(
                AuditEvent::from_context(
                    audit,
                    "approval.requested",
                    AuditCategory::Approval,
                    AuditOutcome::Success,
                )
                .with_metadata("tool_call_ids", call_ids(&checkpoint.pending_tool_calls)),
            );
        }
        Ok(())
    }

    pub async fn discard(&self, session_id: &SessionId) -> Result<bool, AgentError> {
        Ok(self.checkpoints.delete(session_id).await?)
    }

    pub fn record_decision(&self, decision: &Decision, pending: &[ToolCall], audit: &AuditContext) {
        let event_type = match decision {
            Decision::Approve => "approval.granted",
            Decision::Deny { .. } => "approval.denied",
        };
        let mut event = AuditEvent::from_context(
            audit,
            event_type,
            AuditCategory::Approval,
            AuditOutcome::Success,
        )
        .with_metadata("tool_call_ids", call_ids(pending));
        if let Decision::Deny { reason } = decision {
            event = event.with_metadata("reason", reason.clone());
        }
        self.audit.emit(event);
    }

    /// The synthetic result answering the first pending call of a denied batch.
    pub fn denial_result(&self, pending: &[ToolCall], reason: &str) -> Option<ToolResultMessage> {
        pending.first().map(|call| ToolResultMessage {
            tool_call_id: call.id.clone(),
            tool_name: call.name.clone(),
            content: denial_text(reason),
            is_error: false,
        })
    }
}

fn call_ids(calls: &[ToolCall]) -> String {
    calls.iter().map(|call| call.id.as_str()).collect::<Vec<_>>().join(",")
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use dermadesk_core::audit::{AuditContext, InMemoryAuditSink};
    use dermadesk_core::domain::checkpoint::Checkpoint;
    use dermadesk_core::domain::conversation::{AssistantMessage, ToolCall};
    use dermadesk_core::domain::session::SessionId;
    use dermadesk_core::flows::{FlowEvent, FlowState};
    use dermadesk_db::repositories::InMemoryCheckpointRepository;

    use super::{denial_text, Decision, InterruptController};

    fn call(id: &str, name: &str) -> ToolCall {
        ToolCall { id: id.to_string(), name: name.to_string(), arguments: json!({"product_id": 7}) }
    }

    #[test]
    fn console_input_maps_to_decisions() {
        assert_eq!(Decision::from_console_input(" y \n"), Decision::Approve);
        assert_eq!(
            Decision::from_console_input("Y"),
            Decision::Deny { reason: "Y".to_string() }
        );
        assert_eq!(
            Decision::from_console_input("  only one please \r\n"),
            Decision::Deny { reason: "  only one please ".to_string() }
        );
        assert_eq!(
            Decision::from_console_input("cheaper one, 'please'\n"),
            Decision::Deny { reason: "cheaper one, 'please'".to_string() }
        );
        assert_eq!(
            Decision::Deny { reason: "no".to_string() }.to_event(),
            FlowEvent::ApprovalDenied { reason: "no".to_string() }
        );
    }

    #[tokio::test]
    async fn suspending_captures_pending_calls_and_audits() {
        let store = Arc::new(InMemoryCheckpointRepository::default());
        let sink = Arc::new(InMemoryAuditSink::default());
        let controller = InterruptController::new(store.clone(), sink.clone());
        let session = SessionId("shopper-1".to_string());
        let audit = AuditContext::new(Some(session.clone()), "turn-1", "agent_runtime");

        let mut checkpoint = Checkpoint::new(session.clone());
        checkpoint.conversation.push_user("add the serum");
        checkpoint.conversation.push_assistant(AssistantMessage::with_tool_calls(vec![
            call("c1", "add_to_cart"),
            call("c2", "view_cart"),
        ]));
        checkpoint.flow_state = FlowState::AwaitingApproval;

        controller.persist(&mut checkpoint, &audit).await.expect("persist");

        let stored = controller.load(&session).await.expect("load").expect("present");
        assert!(stored.is_awaiting_approval());
        assert_eq!(stored.pending_tool_calls.len(), 2);
        let requested = sink.events_of_type("approval.requested");
        assert_eq!(requested[0].metadata.get("tool_call_ids").map(String::as_str), Some("c1,c2"));
    }

    #[test]
    fn denial_answers_only_the_first_pending_call() {
        let controller = InterruptController::new(
            Arc::new(InMemoryCheckpointRepository::default()),
            Arc::new(InMemoryAuditSink::default()),
        );
        let pending = [call("c1", "add_to_cart"), call("c2", "remove_from_cart")];
        let result = controller.denial_result(&pending, "too pricey").expect("first call");

        assert_eq!(result.tool_call_id, "c1");
        assert_eq!(result.content, denial_text("too pricey"));
        assert!(result.content.contains("Reasoning: 'too pricey'"));
        assert!(controller.denial_result(&[], "x").is_none());
    }
}
