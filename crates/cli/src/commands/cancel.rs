use dermadesk_core::config::{AppConfig, LoadOptions};
use dermadesk_core::domain::session::SessionId;

use crate::commands::{
    async_runtime, build_agent, load_config, open_store, CommandResult, Failure,
};

pub fn run(options: LoadOptions, session: &str) -> CommandResult {
    match cancel(options, session) {
        Ok(true) => {
            CommandResult::success("cancel", format!("session {} cancelled", session.trim()))
        }
        Ok(false) => {
            CommandResult::success("cancel", format!("no saved session {}", session.trim()))
        }
        Err(failure) => CommandResult::from_failure("cancel", failure),
    }
}

fn cancel(options: LoadOptions, session: &str) -> Result<bool, Failure> {
    let session_id = SessionId::parse(session)
        .map_err(|error| Failure::new("invalid_session", error.to_string(), 2))?;
    let config = load_config(options)?;
    crate::logging::init_logging(&config.logging);

    async_runtime()?.block_on(discard(&config, &session_id))
}

async fn discard(config: &AppConfig, session_id: &SessionId) -> Result<bool, Failure> {
    let pool = open_store(config).await?;
    let agent = build_agent(config, &pool)?;
    let cancelled =
        agent.cancel(session_id).await.map_err(|error| Failure::new("agent", error.to_string(), 7));
    pool.close().await;
    cancelled
}
