use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::conversation::{ConversationState, ToolCall};
use crate::domain::session::SessionId;
use crate::flows::FlowState;

/// Resumable snapshot of one session: where the flow stands, the full log, and the calls
/// waiting on a human decision.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub session_id: SessionId,
    pub flow_state: FlowState,
    pub conversation: ConversationState,
    #[serde(default)]
    pub pending_tool_calls: Vec<ToolCall>,
    pub updated_at: DateTime<Utc>,
}

impl Checkpoint {
    pub fn new(session_id: SessionId) -> Self {
        Self {
            conversation: ConversationState::new(session_id.clone()),
            session_id,
            flow_state: FlowState::Ready,
            pending_tool_calls: Vec::new(),
            updated_at: Utc::now(),
        }
    }

    pub fn is_awaiting_approval(&self) -> bool {
        self.flow_state == FlowState::AwaitingApproval
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
