use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::domain::session::SessionId;
use crate::errors::DomainError;

/// Message text: plain, or a list of typed parts as some model backends emit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentPart {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub text: Option<String>,
}

impl MessageContent {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    /// Empty text, an empty part list, or a first part without text.
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Text(text) => text.is_empty(),
            Self::Parts(parts) => {
                parts.first().and_then(|part| part.text.as_deref()).map_or(true, str::is_empty)
            }
        }
    }

    pub fn as_plain_text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Parts(parts) => parts
                .iter()
                .filter_map(|part| part.text.as_deref())
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

impl Default for MessageContent {
    fn default() -> Self {
        Self::Text(String::new())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AssistantMessage {
    pub id: String,
    #[serde(default)]
    pub content: MessageContent,
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
}

impl AssistantMessage {
    pub fn new(content: MessageContent, tool_calls: Vec<ToolCall>) -> Self {
        Self { id: format!("msg_{}", Uuid::new_v4().simple()), content, tool_calls }
    }

    pub fn text(value: impl Into<String>) -> Self {
        Self::new(MessageContent::text(value), Vec::new())
    }

    pub fn with_tool_calls(tool_calls: Vec<ToolCall>) -> Self {
        Self::new(MessageContent::default(), tool_calls)
    }

    pub fn is_degenerate(&self) -> bool {
        self.tool_calls.is_empty() && self.content.is_blank()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResultMessage {
    pub tool_call_id: String,
    pub tool_name: String,
    pub content: String,
    #[serde(default)]
    pub is_error: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Message {
    System { content: MessageContent },
    User { content: MessageContent },
    Assistant(AssistantMessage),
    ToolResult(ToolResultMessage),
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self::User { content: MessageContent::text(text) }
    }

    pub fn role(&self) -> &'static str {
        match self {
            Self::System { .. } => "system",
            Self::User { .. } => "user",
            Self::Assistant(_) => "assistant",
            Self::ToolResult(_) => "tool",
        }
    }
}

/// Append-only message log of one session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConversationState {
    session_id: SessionId,
    messages: Vec<Message>,
}

impl ConversationState {
    pub fn new(session_id: SessionId) -> Self {
        Self { session_id, messages: Vec::new() }
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn push_user(&mut self, text: impl Into<String>) {
        self.messages.push(Message::user(text));
    }

    pub fn push_assistant(&mut self, message: AssistantMessage) {
        self.messages.push(Message::Assistant(message));
    }

    pub fn push(&mut self, message: Message) -> Result<(), DomainError> {
        match message {
            Message::ToolResult(result) => self.push_tool_results(vec![result]),
            other => {
                self.messages.push(other);
                Ok(())
            }
        }
    }

    /// Appends a batch of tool results atomically: either every result pairs with an
    /// unanswered call of the latest assistant message, or nothing is appended.
    pub fn push_tool_results(
        &mut self,
        results: Vec<ToolResultMessage>,
    ) -> Result<(), DomainError> {
        let mut open =
            self.unanswered_tool_calls().into_iter().map(|call| call.id).collect::<Vec<_>>();
        for result in &results {
            match open.iter().position(|id| id == &result.tool_call_id) {
                Some(index) => {
                    open.remove(index);
                }
                None => {
                    return Err(DomainError::UnmatchedToolCall {
                        tool_call_id: result.tool_call_id.clone(),
                    });
                }
            }
        }

        self.messages.extend(results.into_iter().map(Message::ToolResult));
        Ok(())
    }

    /// The final message when it is an assistant message; anything after it (a user turn or
    /// a tool result) means the assistant has not spoken last.
    pub fn latest_assistant(&self) -> Option<&AssistantMessage> {
        match self.messages.last() {
            Some(Message::Assistant(message)) => Some(message),
            _ => None,
        }
    }

    /// Calls of the most recent assistant message that have no result yet, in request order.
    pub fn unanswered_tool_calls(&self) -> Vec<ToolCall> {
        let Some(position) =
            self.messages.iter().rposition(|message| matches!(message, Message::Assistant(_)))
        else {
            return Vec::new();
        };
        let Message::Assistant(assistant) = &self.messages[position] else {
            return Vec::new();
        };

        let mut answered = Vec::new();
        for message in &self.messages[position + 1..] {
            match message {
                Message::ToolResult(result) => answered.push(result.tool_call_id.as_str()),
                _ => return Vec::new(),
            }
        }

        assistant
            .tool_calls
            .iter()
            .filter(|call| !answered.contains(&call.id.as_str()))
            .cloned()
            .collect()
    }

    pub fn last_assistant_text(&self) -> Option<String> {
        self.messages.iter().rev().find_map(|message| match message {
            Message::Assistant(assistant) if !assistant.content.is_blank() => {
                Some(assistant.content.as_plain_text())
            }
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{
        AssistantMessage, ContentPart, ConversationState, Message, MessageContent, ToolCall,
        ToolResultMessage,
    };
    use crate::domain::session::SessionId;
    use crate::errors::DomainError;

    fn call(id: &str, name: &str) -> ToolCall {
        ToolCall { id: id.to_string(), name: name.to_string(), arguments: json!({}) }
    }

    fn result(id: &str) -> ToolResultMessage {
        ToolResultMessage {
            tool_call_id: id.to_string(),
            tool_name: "view_cart".to_string(),
            content: "{}".to_string(),
            is_error: false,
        }
    }

    #[test]
    fn degenerate_detection_covers_text_and_structured_content() {
        assert!(AssistantMessage::text("").is_degenerate());
        assert!(!AssistantMessage::text("hello").is_degenerate());
        assert!(AssistantMessage::new(MessageContent::Parts(Vec::new()), Vec::new())
            .is_degenerate());
        assert!(AssistantMessage::new(
            MessageContent::Parts(vec![ContentPart { kind: "text".to_string(), text: None }]),
            Vec::new()
        )
        .is_degenerate());
        assert!(!AssistantMessage::with_tool_calls(vec![call("c1", "view_cart")])
            .is_degenerate());
    }

    #[test]
    fn tool_results_must_pair_with_open_calls() {
        let mut state = ConversationState::new(SessionId("s-1".to_string()));
        state.push_user("what is in my cart?");
        state.push_assistant(AssistantMessage::with_tool_calls(vec![
            call("c1", "view_cart"),
            call("c2", "get_payment_methods"),
        ]));

        let error = state.push_tool_results(vec![result("c1"), result("zz")]).expect_err("zz");
        assert_eq!(error, DomainError::UnmatchedToolCall { tool_call_id: "zz".to_string() });
        assert_eq!(state.len(), 2, "failed batch must not be partially appended");

        state.push_tool_results(vec![result("c1")]).expect("c1 pairs");
        assert_eq!(state.unanswered_tool_calls(), vec![call("c2", "get_payment_methods")]);

        let duplicate = state.push(Message::ToolResult(result("c1"))).expect_err("duplicate");
        assert!(matches!(duplicate, DomainError::UnmatchedToolCall { .. }));
    }

    #[test]
    fn tool_result_after_user_turn_is_rejected() {
        let mut state = ConversationState::new(SessionId("s-2".to_string()));
        state.push_assistant(AssistantMessage::with_tool_calls(vec![call("c1", "view_cart")]));
        state.push_user("never mind");

        assert!(state.unanswered_tool_calls().is_empty());
        assert!(state.push_tool_results(vec![result("c1")]).is_err());
        assert!(state.latest_assistant().is_none());
    }

    #[test]
    fn messages_serialize_with_role_tag() {
        let message = Message::user("hi");
        let encoded = serde_json::to_value(&message).expect("encode");
        assert_eq!(encoded, json!({"role": "user", "content": "hi"}));
    }
}
