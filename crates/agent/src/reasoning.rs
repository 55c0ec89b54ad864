use std::sync::Arc;

use chrono::Local;
use tera::{Context, Tera};
use tracing::{debug, warn};

use dermadesk_core::domain::conversation::{AssistantMessage, ConversationState, Message};

use crate::errors::AgentError;
use crate::llm::{ChatModel, ToolSchema};

const INSTRUCTIONS_TEMPLATE: &str = "support_instructions";
const INSTRUCTIONS_SOURCE: &str =
    include_str!("../../../templates/prompts/support_instructions.tera");

pub const REPROMPT_TEXT: &str = "Respond with a real output.";

/// What one reasoning step adds to the log: the re-prompts it had to inject, then the
/// message the model finally produced.
#[derive(Clone, Debug, PartialEq)]
pub struct ReasoningOutput {
    pub injected_prompts: Vec<Message>,
    pub message: AssistantMessage,
}

pub struct ReasoningStep {
    model: Arc<dyn ChatModel>,
    tools: Vec<ToolSchema>,
    templates: Tera,
    max_reprompts: u32,
}

impl ReasoningStep {
    pub fn new(
        model: Arc<dyn ChatModel>,
        tools: Vec<ToolSchema>,
        max_reprompts: u32,
    ) -> Result<Self, AgentError> {
        let mut templates = Tera::default();
        templates.add_raw_template(INSTRUCTIONS_TEMPLATE, INSTRUCTIONS_SOURCE)?;
        Ok(Self { model, tools, templates, max_reprompts })
    }

    pub fn instructions(&self, conversation: &ConversationState) -> Result<String, AgentError> {
        let mut context = Context::new();
        context.insert("user_info", conversation.session_id().as_str());
        context.insert("time", &Local::now().format("%Y-%m-%d %H:%M:%S").to_string());
        Ok(self.templates.render(INSTRUCTIONS_TEMPLATE, &context)?)
    }

    /// Invokes the model until it answers with text or tool calls. Each empty answer is
    /// dropped and followed by a re-prompt; the re-prompts are returned so the caller can
    /// record them.
    pub async fn run(
        &self,
        conversation: &ConversationState,
    ) -> Result<ReasoningOutput, AgentError> {
        let instructions = self.instructions(conversation)?;
        let mut history = conversation.messages().to_vec();
        let mut injected_prompts = Vec::new();

        loop {
            let message = self.model.invoke(&instructions, &history, &self.tools).await?;
            if !message.is_degenerate() {
                debug!(
                    event_name = "agent.reasoning.completed",
                    session_id = %conversation.session_id(),
                    tool_calls = message.tool_calls.len(),
                    reprompts = injected_prompts.len(),
                    "model responded"
                );
                return Ok(ReasoningOutput { injected_prompts, message });
            }

            let attempts = injected_prompts.len() as u32;
            if attempts >= self.max_reprompts {
                warn!(
                    event_name = "agent.reasoning.degenerate",
                    session_id = %conversation.session_id(),
                    attempts,
                    "giving up on empty model output"
                );
                return Err(AgentError::DegenerateOutput { attempts });
            }

            warn!(
                event_name = "agent.reasoning.reprompt",
                session_id = %conversation.session_id(),
                attempt = attempts + 1,
                "model returned empty output; re-prompting"
            );
            let prompt = Message::user(REPROMPT_TEXT);
            history.push(prompt.clone());
            injected_prompts.push(prompt);
        }
    }
}
