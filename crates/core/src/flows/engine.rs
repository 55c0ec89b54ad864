use thiserror::Error;

use crate::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use crate::flows::states::{
    FlowAction, FlowContext, FlowEvent, FlowState, RouteDestination, TransitionOutcome,
};

pub trait FlowDefinition {
    fn initial_state(&self) -> FlowState;
    fn transition(
        &self,
        current: &FlowState,
        event: &FlowEvent,
        context: &FlowContext,
    ) -> Result<TransitionOutcome, FlowTransitionError>;
}

/// Reasoning/tool cycle with a human gate in front of the sensitive tool path.
#[derive(Clone, Debug, Default)]
pub struct SupportAgentFlow;

impl FlowDefinition for SupportAgentFlow {
    fn initial_state(&self) -> FlowState {
        FlowState::Ready
    }

    fn transition(
        &self,
        current: &FlowState,
        event: &FlowEvent,
        context: &FlowContext,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        transition_support_agent(current, event, context)
    }
}

pub struct FlowEngine<F> {
    flow: F,
}

impl<F> FlowEngine<F>
where
    F: FlowDefinition,
{
    pub fn new(flow: F) -> Self {
        Self { flow }
    }

    pub fn initial_state(&self) -> FlowState {
        self.flow.initial_state()
    }

    pub fn apply(
        &self,
        current: &FlowState,
        event: &FlowEvent,
        context: &FlowContext,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        self.flow.transition(current, event, context)
    }

    pub fn apply_with_audit<S>(
        &self,
        current: &FlowState,
        event: &FlowEvent,
        context: &FlowContext,
        sink: &S,
        audit: &AuditContext,
    ) -> Result<TransitionOutcome, FlowTransitionError>
    where
        S: AuditSink + ?Sized,
    {
        let result = self.apply(current, event, context);
        match &result {
            Ok(outcome) => {
                sink.emit(
                    AuditEvent::new(
                        audit.session_id.clone(),
                        audit.correlation_id.clone(),
                        "flow.transition_applied",
                        AuditCategory::Flow,
                        audit.actor.clone(),
                        AuditOutcome::Success,
                    )
                    .with_metadata("from", outcome.from.as_str())
                    .with_metadata("to", outcome.to.as_str())
                    .with_metadata("event", format!("{:?}", outcome.event)),
                );
            }
            Err(error) => {
                sink.emit(
                    AuditEvent::new(
                        audit.session_id.clone(),
                        audit.correlation_id.clone(),
                        "flow.transition_rejected",
                        AuditCategory::Flow,
                        audit.actor.clone(),
                        AuditOutcome::Rejected,
                    )
                    .with_metadata("error", error.to_string()),
                );
            }
        }
        result
    }
}

impl Default for FlowEngine<SupportAgentFlow> {
    fn default() -> Self {
        Self::new(SupportAgentFlow)
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FlowTransitionError {
    #[error("no pending tool calls to resolve in state {state:?}")]
    NoPendingToolCalls { state: FlowState },
    #[error("invalid transition from {state:?} using event {event:?}")]
    InvalidTransition { state: FlowState, event: FlowEvent },
}

fn transition_support_agent(
    current: &FlowState,
    event: &FlowEvent,
    context: &FlowContext,
) -> Result<TransitionOutcome, FlowTransitionError> {
    use FlowAction::{
        AppendDenial, DiscardCheckpoint, ExecuteSafeTools, ExecuteSensitiveTools, InvokeModel,
        PersistCheckpoint, ReplyToUser,
    };
    use FlowEvent::{
        ApprovalDenied, ApprovalGranted, CancelRequested, ModelResponded, ToolsCompleted,
        TurnFailed, UserMessageReceived,
    };
    use FlowState::{
        AwaitingApproval, Ready, Reasoning, SafeTools, SensitiveTools, Terminated,
    };

    let (to, actions) = match (current, event) {
        (Ready, UserMessageReceived) | (Terminated, UserMessageReceived) => {
            (Reasoning, vec![InvokeModel])
        }
        (Reasoning, ModelResponded { destination }) => match destination {
            RouteDestination::Terminate => (Terminated, vec![PersistCheckpoint, ReplyToUser]),
            RouteDestination::SafeTools => (SafeTools, vec![ExecuteSafeTools]),
            // Checkpoint is written before anything on the sensitive path can run.
            RouteDestination::SensitiveTools => (AwaitingApproval, vec![PersistCheckpoint]),
        },
        (SafeTools, ToolsCompleted) => (Reasoning, vec![InvokeModel]),
        // Cart changes are recorded in the log before the model sees them.
        (SensitiveTools, ToolsCompleted) => (Reasoning, vec![PersistCheckpoint, InvokeModel]),
        (AwaitingApproval, ApprovalGranted) | (AwaitingApproval, ApprovalDenied { .. })
            if context.pending_tool_calls == 0 =>
        {
            return Err(FlowTransitionError::NoPendingToolCalls { state: *current });
        }
        // Decisions are persisted before they take effect.
        (AwaitingApproval, ApprovalGranted) => {
            (SensitiveTools, vec![PersistCheckpoint, ExecuteSensitiveTools])
        }
        (AwaitingApproval, ApprovalDenied { .. }) => {
            (Reasoning, vec![AppendDenial, PersistCheckpoint, InvokeModel])
        }
        (_, CancelRequested) => (Terminated, vec![DiscardCheckpoint]),
        // A failed turn closes the cycle; the log is kept and no pending call survives.
        (Reasoning | SafeTools | SensitiveTools, TurnFailed { .. }) => {
            (Terminated, vec![PersistCheckpoint])
        }
        _ => {
            return Err(FlowTransitionError::InvalidTransition {
                state: *current,
                event: event.clone(),
            });
        }
    };

    Ok(TransitionOutcome { from: *current, to, event: event.clone(), actions })
}
