use thiserror::Error;

use dermadesk_core::errors::DomainError;
use dermadesk_core::flows::FlowTransitionError;
use dermadesk_db::repositories::RepositoryError;

use crate::llm::LlmError;
use crate::tools::ToolError;

/// Errors that end a turn. Correctable tool failures never surface here; they are fed
/// back to the model as error tool results instead.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("model produced no usable output after {attempts} re-prompts")]
    DegenerateOutput { attempts: u32 },
    #[error(transparent)]
    Llm(#[from] LlmError),
    #[error(transparent)]
    Tool(#[from] ToolError),
    #[error("checkpoint store error: {0}")]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Flow(#[from] FlowTransitionError),
    #[error("turn exceeded {limit} model/tool steps")]
    StepLimitExceeded { limit: u32 },
    #[error("no checkpoint exists for session `{0}`")]
    UnknownSession(String),
    #[error("instruction template error: {0}")]
    Template(String),
}

impl From<tera::Error> for AgentError {
    fn from(error: tera::Error) -> Self {
        Self::Template(error.to_string())
    }
}

impl AgentError {
    /// Whether the session may still be driven after this error.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Flow(_) | Self::UnknownSession(_))
    }
}
