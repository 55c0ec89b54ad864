pub mod cancel;
pub mod chat;
pub mod config;
pub mod migrate;
pub mod seed;

use std::sync::Arc;

use dermadesk_agent::audit::TracingAuditSink;
use dermadesk_agent::catalog_tools::catalog_tool_registry;
use dermadesk_agent::providers::build_chat_model;
use dermadesk_agent::AgentRuntime;
use dermadesk_core::config::{AppConfig, LoadOptions};
use dermadesk_db::repositories::{
    SqlCartRepository, SqlCatalogRepository, SqlCheckpointRepository,
};
use dermadesk_db::{connect_with_config, migrations, DbPool};
use serde::Serialize;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
        };
        Self { exit_code, output: serialize_payload(payload) }
    }

    fn from_failure(command: &str, failure: Failure) -> Self {
        Self::failure(command, failure.error_class, failure.message, failure.exit_code)
    }
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

/// A classified command failure; the class and exit code are part of the CLI contract.
#[derive(Debug)]
pub(crate) struct Failure {
    error_class: &'static str,
    message: String,
    exit_code: u8,
}

impl Failure {
    pub(crate) fn new(
        error_class: &'static str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        Self { error_class, message: message.into(), exit_code }
    }
}

pub(crate) fn load_config(options: LoadOptions) -> Result<AppConfig, Failure> {
    AppConfig::load(options).map_err(|error| {
        Failure::new("config_validation", format!("configuration issue: {error}"), 2)
    })
}

pub(crate) fn async_runtime() -> Result<tokio::runtime::Runtime, Failure> {
    tokio::runtime::Builder::new_current_thread().enable_all().build().map_err(|error| {
        Failure::new("runtime_init", format!("failed to initialize async runtime: {error}"), 3)
    })
}

pub(crate) async fn open_store(config: &AppConfig) -> Result<DbPool, Failure> {
    let pool = connect_with_config(&config.database)
        .await
        .map_err(|error| Failure::new("db_connectivity", error.to_string(), 4))?;
    migrations::run_pending(&pool)
        .await
        .map_err(|error| Failure::new("migration", error.to_string(), 5))?;
    Ok(pool)
}

/// Wires the agent to the SQLite store and the configured model backend.
pub(crate) fn build_agent(config: &AppConfig, pool: &DbPool) -> Result<AgentRuntime, Failure> {
    let registry = catalog_tool_registry(
        Arc::new(SqlCatalogRepository::new(pool.clone())),
        Arc::new(SqlCartRepository::new(pool.clone())),
    )
    .map_err(|error| Failure::new("runtime_init", error.to_string(), 3))?;
    let model = build_chat_model(&config.llm)
        .map_err(|error| Failure::new("llm_init", error.to_string(), 3))?;

    AgentRuntime::new(
        model,
        Arc::new(registry),
        Arc::new(SqlCheckpointRepository::new(pool.clone())),
        Arc::new(TracingAuditSink),
        &config.agent,
    )
    .map_err(|error| Failure::new("runtime_init", error.to_string(), 3))
}
