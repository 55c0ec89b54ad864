use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use dermadesk_core::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use dermadesk_core::config::AgentConfig;
use dermadesk_core::domain::checkpoint::Checkpoint;
use dermadesk_core::domain::conversation::{Message, ToolCall};
use dermadesk_core::domain::session::SessionId;
use dermadesk_core::flows::{
    FlowAction, FlowContext, FlowEngine, FlowEvent, FlowState, SupportAgentFlow,
    TransitionOutcome,
};
use dermadesk_db::repositories::CheckpointRepository;

use crate::errors::AgentError;
use crate::executor::{error_result, ToolExecutor};
use crate::interrupt::{Decision, InterruptController};
use crate::llm::ChatModel;
use crate::reasoning::ReasoningStep;
use crate::router::Router;
use crate::tools::{ToolContext, ToolError, ToolRegistry};

const ACTOR: &str = "agent_runtime";

/// Where a call into the runtime left the session.
#[derive(Clone, Debug, PartialEq)]
pub enum TurnOutcome {
    Completed { reply: Option<String> },
    AwaitingApproval { pending: Vec<ToolCall> },
}

#[derive(Clone, Debug, PartialEq)]
pub struct TurnReport {
    pub outcome: TurnOutcome,
    /// Messages appended to the conversation during this call, in order.
    pub messages: Vec<Message>,
}

struct Turn {
    audit: AuditContext,
    tools: ToolContext,
    steps: u32,
    reply: Option<String>,
}

/// Drives one session through the reasoning/tool cycle. Every state change goes through
/// the pure flow definition; this type only performs the actions it returns.
pub struct AgentRuntime {
    engine: FlowEngine<SupportAgentFlow>,
    reasoning: ReasoningStep,
    router: Router,
    safe_executor: ToolExecutor,
    sensitive_executor: ToolExecutor,
    interrupts: InterruptController,
    audit: Arc<dyn AuditSink>,
    max_steps_per_turn: u32,
}

impl AgentRuntime {
    pub fn new(
        model: Arc<dyn ChatModel>,
        registry: Arc<ToolRegistry>,
        checkpoints: Arc<dyn CheckpointRepository>,
        audit: Arc<dyn AuditSink>,
        settings: &AgentConfig,
    ) -> Result<Self, AgentError> {
        Ok(Self {
            engine: FlowEngine::default(),
            reasoning: ReasoningStep::new(model, registry.schemas(), settings.max_reprompts)?,
            router: Router::new(registry.clone()),
            safe_executor: ToolExecutor::safe(registry.clone()),
            sensitive_executor: ToolExecutor::sensitive(registry),
            interrupts: InterruptController::new(checkpoints, audit.clone()),
            audit,
            max_steps_per_turn: settings.max_steps_per_turn,
        })
    }

    pub async fn load_session(
        &self,
        session_id: &SessionId,
    ) -> Result<Option<Checkpoint>, AgentError> {
        self.interrupts.load(session_id).await
    }

    /// Appends the user's message and runs the cycle until the model answers in text or a
    /// sensitive action needs approval.
    pub async fn submit_user_message(
        &self,
        session_id: &SessionId,
        text: &str,
    ) -> Result<TurnReport, AgentError> {
        let mut checkpoint = self
            .interrupts
            .load(session_id)
            .await?
            .unwrap_or_else(|| Checkpoint::new(session_id.clone()));
        let mut turn = self.start_turn(session_id);
        self.recover_interrupted(&mut checkpoint, &turn).await?;
        let start = checkpoint.conversation.len();

        let outcome = self.transition(&mut checkpoint, FlowEvent::UserMessageReceived, &turn)?;
        checkpoint.conversation.push_user(text);
        info!(
            event_name = "agent.turn.started",
            session_id = %session_id,
            correlation_id = %turn.audit.correlation_id,
            "user message received"
        );

        self.run(&mut checkpoint, outcome, &mut turn).await?;
        Ok(self.report(&checkpoint, start, turn))
    }

    /// Applies a human decision to a suspended session. The flow persists the claimed
    /// decision before any tool runs, so replaying it is rejected rather than executed.
    pub async fn resume(
        &self,
        session_id: &SessionId,
        decision: Decision,
    ) -> Result<TurnReport, AgentError> {
        let mut checkpoint = self
            .interrupts
            .load(session_id)
            .await?
            .ok_or_else(|| AgentError::UnknownSession(session_id.to_string()))?;
        let mut turn = self.start_turn(session_id);
        self.recover_interrupted(&mut checkpoint, &turn).await?;
        let start = checkpoint.conversation.len();

        let outcome = self.transition(&mut checkpoint, decision.to_event(), &turn)?;
        self.interrupts.record_decision(&decision, &checkpoint.pending_tool_calls, &turn.audit);

        self.run(&mut checkpoint, outcome, &mut turn).await?;
        Ok(self.report(&checkpoint, start, turn))
    }

    /// Ends the session without running anything still pending. Returns whether a
    /// checkpoint existed.
    pub async fn cancel(&self, session_id: &SessionId) -> Result<bool, AgentError> {
        let Some(mut checkpoint) = self.interrupts.load(session_id).await? else {
            return Ok(false);
        };
        let mut turn = self.start_turn(session_id);
        let outcome = self.transition(&mut checkpoint, FlowEvent::CancelRequested, &turn)?;
        self.run(&mut checkpoint, outcome, &mut turn).await?;
        Ok(true)
    }

    fn start_turn(&self, session_id: &SessionId) -> Turn {
        Turn {
            audit: AuditContext::new(
                Some(session_id.clone()),
                format!("turn_{}", Uuid::new_v4().simple()),
                ACTOR,
            ),
            tools: ToolContext::new(session_id.clone()),
            steps: 0,
            reply: None,
        }
    }

    fn transition(
        &self,
        checkpoint: &mut Checkpoint,
        event: FlowEvent,
        turn: &Turn,
    ) -> Result<TransitionOutcome, AgentError> {
        let context = FlowContext { pending_tool_calls: checkpoint.pending_tool_calls.len() };
        let outcome = self.engine.apply_with_audit(
            &checkpoint.flow_state,
            &event,
            &context,
            self.audit.as_ref(),
            &turn.audit,
        )?;
        checkpoint.flow_state = outcome.to;
        Ok(outcome)
    }

    async fn run(
        &self,
        checkpoint: &mut Checkpoint,
        first: TransitionOutcome,
        turn: &mut Turn,
    ) -> Result<(), AgentError> {
        let result = self.drive(checkpoint, first, turn).await;
        if let Err(error) = &result {
            self.fail_turn(checkpoint, error, turn).await;
        }
        result
    }

    async fn drive(
        &self,
        checkpoint: &mut Checkpoint,
        first: TransitionOutcome,
        turn: &mut Turn,
    ) -> Result<(), AgentError> {
        let mut outcome = first;
        loop {
            match self.perform(checkpoint, &outcome, turn).await? {
                Some(event) => outcome = self.transition(checkpoint, event, turn)?,
                None => return Ok(()),
            }
        }
    }

    /// Executes the actions of one transition and returns the event they produced, if any.
    async fn perform(
        &self,
        checkpoint: &mut Checkpoint,
        outcome: &TransitionOutcome,
        turn: &mut Turn,
    ) -> Result<Option<FlowEvent>, AgentError> {
        let mut next = None;

        for action in &outcome.actions {
            match action {
                FlowAction::InvokeModel => {
                    self.count_step(turn)?;
                    let output = self.reasoning.run(&checkpoint.conversation).await?;
                    for prompt in output.injected_prompts {
                        checkpoint.conversation.push(prompt)?;
                    }
                    checkpoint.conversation.push_assistant(output.message);
                    let destination = self.router.route(&checkpoint.conversation);
                    next = Some(FlowEvent::ModelResponded { destination });
                }
                FlowAction::ExecuteSafeTools => {
                    self.count_step(turn)?;
                    let calls = checkpoint.conversation.unanswered_tool_calls();
                    let results = self.safe_executor.execute(&turn.tools, &calls).await?;
                    checkpoint.conversation.push_tool_results(results)?;
                    next = Some(FlowEvent::ToolsCompleted);
                }
                FlowAction::ExecuteSensitiveTools => {
                    self.count_step(turn)?;
                    let calls = std::mem::take(&mut checkpoint.pending_tool_calls);
                    let results = self.sensitive_executor.execute(&turn.tools, &calls).await?;
                    checkpoint.conversation.push_tool_results(results)?;
                    next = Some(FlowEvent::ToolsCompleted);
                }
                FlowAction::AppendDenial => {
                    let reason = match &outcome.event {
                        FlowEvent::ApprovalDenied { reason } => reason.as_str(),
                        _ => "",
                    };
                    let pending = std::mem::take(&mut checkpoint.pending_tool_calls);
                    if let Some(result) = self.interrupts.denial_result(&pending, reason) {
                        checkpoint.conversation.push_tool_results(vec![result])?;
                    }
                }
                FlowAction::PersistCheckpoint => {
                    self.interrupts.persist(checkpoint, &turn.audit).await?;
                }
                FlowAction::DiscardCheckpoint => {
                    checkpoint.pending_tool_calls.clear();
                    self.interrupts.discard(&checkpoint.session_id).await?;
                    info!(
                        event_name = "agent.session.cancelled",
                        session_id = %checkpoint.session_id,
                        "checkpoint discarded"
                    );
                }
                FlowAction::ReplyToUser => {
                    turn.reply = checkpoint.conversation.last_assistant_text();
                }
            }
        }

        Ok(next)
    }

    fn count_step(&self, turn: &mut Turn) -> Result<(), AgentError> {
        turn.steps += 1;
        if turn.steps > self.max_steps_per_turn {
            return Err(AgentError::StepLimitExceeded { limit: self.max_steps_per_turn });
        }
        Ok(())
    }

    /// Records a failed cycle as terminated so the next user message starts cleanly.
    /// States outside the cycle (suspended, already terminated) are left as stored.
    async fn fail_turn(&self, checkpoint: &mut Checkpoint, error: &AgentError, turn: &Turn) {
        warn!(
            event_name = "agent.turn.failed",
            session_id = %checkpoint.session_id,
            correlation_id = %turn.audit.correlation_id,
            state = checkpoint.flow_state.as_str(),
            error = %error,
            "turn failed"
        );
        if !checkpoint.flow_state.is_mid_cycle() {
            return;
        }
        if let Err(close_error) = self.close_cycle(checkpoint, error.to_string(), turn).await {
            warn!(
                event_name = "agent.turn.persist_failed",
                session_id = %checkpoint.session_id,
                error = %close_error,
                "could not record failed turn"
            );
        }
    }

    /// A checkpoint left mid-cycle belongs to a turn whose process stopped before the
    /// turn ended. It is closed as failed so the session accepts input again.
    async fn recover_interrupted(
        &self,
        checkpoint: &mut Checkpoint,
        turn: &Turn,
    ) -> Result<(), AgentError> {
        if !checkpoint.flow_state.is_mid_cycle() {
            return Ok(());
        }
        let interrupted = checkpoint.flow_state;
        warn!(
            event_name = "agent.turn.recovered",
            session_id = %checkpoint.session_id,
            correlation_id = %turn.audit.correlation_id,
            state = interrupted.as_str(),
            "closing a turn that never finished"
        );
        self.close_cycle(checkpoint, "turn interrupted before it finished".to_string(), turn)
            .await?;
        self.audit.emit(
            AuditEvent::from_context(
                &turn.audit,
                "checkpoint.recovered",
                AuditCategory::Persistence,
                AuditOutcome::Success,
            )
            .with_metadata("interrupted_state", interrupted.as_str()),
        );
        Ok(())
    }

    /// Terminates a mid-cycle checkpoint. Calls left without a result are answered with an
    /// error so the log stays well formed, and nothing stays pending.
    async fn close_cycle(
        &self,
        checkpoint: &mut Checkpoint,
        reason: String,
        turn: &Turn,
    ) -> Result<(), AgentError> {
        let outcome = self.transition(checkpoint, FlowEvent::TurnFailed { reason }, turn)?;
        checkpoint.pending_tool_calls.clear();
        let unanswered = checkpoint.conversation.unanswered_tool_calls();
        if !unanswered.is_empty() {
            let interrupted = ToolError::Execution("no result was recorded for this call".into());
            let results = unanswered.iter().map(|call| error_result(call, &interrupted)).collect();
            checkpoint.conversation.push_tool_results(results)?;
        }
        if outcome.actions.contains(&FlowAction::PersistCheckpoint) {
            self.interrupts.persist(checkpoint, &turn.audit).await?;
        }
        Ok(())
    }

    fn report(&self, checkpoint: &Checkpoint, start: usize, turn: Turn) -> TurnReport {
        let outcome = match checkpoint.flow_state {
            FlowState::AwaitingApproval => {
                TurnOutcome::AwaitingApproval { pending: checkpoint.pending_tool_calls.clone() }
            }
            _ => TurnOutcome::Completed { reply: turn.reply },
        };
        info!(
            event_name = "agent.turn.finished",
            session_id = %checkpoint.session_id,
            correlation_id = %turn.audit.correlation_id,
            state = checkpoint.flow_state.as_str(),
            steps = turn.steps,
            "turn finished"
        );
        TurnReport {
            outcome,
            messages: checkpoint.conversation.messages().get(start..).unwrap_or_default().to_vec(),
        }
    }
}
