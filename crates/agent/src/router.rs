use std::sync::Arc;

use dermadesk_core::domain::conversation::ConversationState;
use dermadesk_core::flows::RouteDestination;

use crate::tools::ToolRegistry;

/// Picks the next node from the latest assistant message. Only the first tool call
/// decides the path; the safe executor refuses any sensitive call that rides along.
pub struct Router {
    registry: Arc<ToolRegistry>,
}

impl Router {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    pub fn route(&self, conversation: &ConversationState) -> RouteDestination {
        let Some(first_call) =
            conversation.latest_assistant().and_then(|message| message.tool_calls.first())
        else {
            return RouteDestination::Terminate;
        };

        if self.registry.is_sensitive(&first_call.name) {
            RouteDestination::SensitiveTools
        } else {
            RouteDestination::SafeTools
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use dermadesk_core::domain::conversation::{AssistantMessage, ConversationState, ToolCall};
    use dermadesk_core::domain::session::SessionId;
    use dermadesk_core::flows::RouteDestination;
    use dermadesk_db::repositories::{InMemoryCartRepository, InMemoryCatalogRepository};

    use super::Router;
    use crate::catalog_tools::catalog_tool_registry;

    fn router() -> Router {
        let registry = catalog_tool_registry(
            Arc::new(InMemoryCatalogRepository::default()),
            Arc::new(InMemoryCartRepository::default()),
        )
        .expect("registry");
        Router::new(Arc::new(registry))
    }

    fn calls(names: &[&str]) -> AssistantMessage {
        AssistantMessage::with_tool_calls(
            names
                .iter()
                .enumerate()
                .map(|(index, name)| ToolCall {
                    id: format!("call_{index}"),
                    name: name.to_string(),
                    arguments: json!({}),
                })
                .collect(),
        )
    }

    fn conversation_with(message: AssistantMessage) -> ConversationState {
        let mut conversation = ConversationState::new(SessionId("s".to_string()));
        conversation.push_user("hi");
        conversation.push_assistant(message);
        conversation
    }

    #[test]
    fn text_only_reply_terminates() {
        assert_eq!(
            router().route(&conversation_with(AssistantMessage::text("Hello!"))),
            RouteDestination::Terminate
        );
    }

    #[test]
    fn latest_message_must_be_from_the_assistant() {
        let mut conversation = conversation_with(calls(&["view_cart"]));
        conversation.push_user("never mind");
        assert_eq!(router().route(&conversation), RouteDestination::Terminate);
    }

    #[test]
    fn first_call_decides_the_path() {
        let router = router();
        assert_eq!(
            router.route(&conversation_with(calls(&["add_to_cart", "view_cart"]))),
            RouteDestination::SensitiveTools
        );
        assert_eq!(
            router.route(&conversation_with(calls(&["view_cart", "add_to_cart"]))),
            RouteDestination::SafeTools
        );
        assert_eq!(
            router.route(&conversation_with(calls(&["made_up_tool"]))),
            RouteDestination::SafeTools
        );
    }
}
