use std::collections::HashSet;
use std::io::{self, BufRead, Write};

use anyhow::Result;
use dermadesk_agent::{AgentError, AgentRuntime, Decision, TurnOutcome, TurnReport};
use dermadesk_core::config::{AppConfig, LoadOptions};
use dermadesk_core::domain::conversation::{Message, ToolCall};
use dermadesk_core::domain::session::SessionId;
use tracing::info;

use crate::commands::{
    async_runtime, build_agent, load_config, open_store, CommandResult, Failure,
};
use crate::logging::init_logging;

pub const WELCOME: &str = "Welcome to the Skincare Assistant Chatbot!";
pub const FAREWELL: &str = "Thank you for using Beauty Products Customer Support. Goodbye!";
pub const APPROVAL_PROMPT: &str = "Do you approve of the above actions? Type 'y' to continue; otherwise, explain your requested changed.\n\n";
const MAX_PRINTED_CHARS: usize = 1500;

pub fn run(options: LoadOptions, session: Option<String>) -> CommandResult {
    match chat(options, session) {
        Ok(()) => CommandResult { exit_code: 0, output: String::new() },
        Err(failure) => CommandResult::from_failure("chat", failure),
    }
}

fn chat(options: LoadOptions, session: Option<String>) -> Result<(), Failure> {
    let session_id = match session {
        Some(raw) => SessionId::parse(&raw)
            .map_err(|error| Failure::new("invalid_session", error.to_string(), 2))?,
        None => SessionId::generate(),
    };
    let config = load_config(options)?;
    init_logging(&config.logging);

    async_runtime()?.block_on(start(&config, session_id))
}

async fn start(config: &AppConfig, session_id: SessionId) -> Result<(), Failure> {
    let pool = open_store(config).await?;
    let agent = build_agent(config, &pool)?;
    info!(event_name = "cli.chat.started", session_id = %session_id, "console session started");

    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut console = Console::new(stdin.lock(), stdout.lock());
    let outcome = console
        .converse(&agent, &session_id)
        .await
        .map_err(|error| Failure::new("agent", format!("{error:#}"), 7));

    pool.close().await;
    outcome
}

/// Line-oriented front end for one session. Remembers which assistant messages it has
/// already shown so a resumed session does not repeat them.
pub struct Console<R, W> {
    input: R,
    output: W,
    printed: HashSet<String>,
}

impl<R: BufRead, W: Write> Console<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output, printed: HashSet::new() }
    }

    pub fn into_output(self) -> W {
        self.output
    }

    /// Runs until `quit`/`exit` or end of input. Errors that leave the session usable are
    /// reported inline; the rest end the conversation.
    pub async fn converse(
        &mut self,
        agent: &AgentRuntime,
        session_id: &SessionId,
    ) -> Result<()> {
        writeln!(self.output, "{WELCOME}")?;

        match agent.load_session(session_id).await? {
            Some(checkpoint) => {
                for message in checkpoint.conversation.messages() {
                    if let Message::Assistant(assistant) = message {
                        self.printed.insert(assistant.id.clone());
                    }
                }
                writeln!(self.output, "Resuming session {session_id}.")?;
                if checkpoint.is_awaiting_approval() {
                    let pending = checkpoint.pending_tool_calls;
                    if !self.settle_approvals(agent, session_id, pending).await? {
                        return Ok(());
                    }
                }
            }
            None => writeln!(self.output, "Session: {session_id}")?,
        }

        loop {
            writeln!(self.output, "{}", "-".repeat(50))?;
            write!(self.output, "\nYou: ")?;
            self.output.flush()?;

            let Some(line) = self.read_line()? else {
                return self.farewell();
            };
            let text = line.trim();
            if matches!(text.to_lowercase().as_str(), "quit" | "exit") {
                return self.farewell();
            }
            if text.is_empty() {
                continue;
            }

            write!(self.output, "\nAssistant: ")?;
            match agent.submit_user_message(session_id, text).await {
                Ok(report) => {
                    self.print_report(&report)?;
                    if let TurnOutcome::AwaitingApproval { pending } = report.outcome {
                        if !self.settle_approvals(agent, session_id, pending).await? {
                            return Ok(());
                        }
                    }
                }
                Err(error) if keeps_session(&error) => {
                    writeln!(self.output, "Sorry, something went wrong: {error}")?;
                }
                Err(error) => return Err(error.into()),
            }
        }
    }

    /// Asks for decisions until the session is no longer suspended. Returns `false` when
    /// input ends first; the checkpoint then stays suspended for a later `--session` run.
    async fn settle_approvals(
        &mut self,
        agent: &AgentRuntime,
        session_id: &SessionId,
        mut pending: Vec<ToolCall>,
    ) -> Result<bool> {
        loop {
            self.print_pending(&pending)?;
            write!(self.output, "{APPROVAL_PROMPT}")?;
            self.output.flush()?;

            let Some(line) = self.read_line()? else {
                writeln!(
                    self.output,
                    "\nSession {session_id} is waiting for your decision; resume it with `dermadesk chat --session {session_id}`."
                )?;
                return Ok(false);
            };

            let report = match agent.resume(session_id, Decision::from_console_input(&line)).await {
                Ok(report) => report,
                Err(error) if keeps_session(&error) => {
                    writeln!(self.output, "Sorry, something went wrong: {error}")?;
                    return Ok(true);
                }
                Err(error) => return Err(error.into()),
            };
            self.print_report(&report)?;

            match report.outcome {
                TurnOutcome::AwaitingApproval { pending: next } => pending = next,
                TurnOutcome::Completed { .. } => return Ok(true),
            }
        }
    }

    fn print_report(&mut self, report: &TurnReport) -> Result<()> {
        for message in &report.messages {
            let Message::Assistant(assistant) = message else {
                continue;
            };
            if assistant.content.is_blank() || !self.printed.insert(assistant.id.clone()) {
                continue;
            }
            writeln!(self.output, "{}\n\n", truncate(&assistant.content.as_plain_text()))?;
        }
        Ok(())
    }

    fn print_pending(&mut self, pending: &[ToolCall]) -> Result<()> {
        writeln!(self.output, "\nThe assistant wants to:")?;
        for call in pending {
            writeln!(self.output, "  - {} {}", call.name, call.arguments)?;
        }
        Ok(())
    }

    fn read_line(&mut self) -> Result<Option<String>> {
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line))
    }

    fn farewell(&mut self) -> Result<()> {
        writeln!(self.output, "\n{FAREWELL}")?;
        Ok(())
    }
}

fn keeps_session(error: &AgentError) -> bool {
    error.is_rejection()
        || matches!(
            error,
            AgentError::DegenerateOutput { .. }
                | AgentError::Llm(_)
                | AgentError::StepLimitExceeded { .. }
        )
}

fn truncate(content: &str) -> String {
    match content.char_indices().nth(MAX_PRINTED_CHARS) {
        Some((cut, _)) => format!("{} ... (truncated)", &content[..cut]),
        None => content.to_string(),
    }
}
