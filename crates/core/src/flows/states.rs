use serde::{Deserialize, Serialize};

/// Where a session's reasoning/tool cycle currently stands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowState {
    Ready,
    Reasoning,
    SafeTools,
    AwaitingApproval,
    SensitiveTools,
    Terminated,
}

impl FlowState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::Reasoning => "reasoning",
            Self::SafeTools => "safe_tools",
            Self::AwaitingApproval => "awaiting_approval",
            Self::SensitiveTools => "sensitive_tools",
            Self::Terminated => "terminated",
        }
    }

    /// States a turn passes through without stopping. A checkpoint stored in one of them
    /// belongs to a turn that never finished.
    pub fn is_mid_cycle(&self) -> bool {
        matches!(self, Self::Reasoning | Self::SafeTools | Self::SensitiveTools)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteDestination {
    Terminate,
    SafeTools,
    SensitiveTools,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowEvent {
    UserMessageReceived,
    ModelResponded { destination: RouteDestination },
    ToolsCompleted,
    ApprovalGranted,
    ApprovalDenied { reason: String },
    CancelRequested,
    TurnFailed { reason: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct FlowContext {
    pub pending_tool_calls: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowAction {
    InvokeModel,
    ExecuteSafeTools,
    ExecuteSensitiveTools,
    AppendDenial,
    PersistCheckpoint,
    DiscardCheckpoint,
    ReplyToUser,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub from: FlowState,
    pub to: FlowState,
    pub event: FlowEvent,
    pub actions: Vec<FlowAction>,
}
