pub mod audit;
pub mod config;
pub mod domain;
pub mod errors;
pub mod flows;

pub use audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
pub use domain::cart::{AdditionPlan, CartLine, CartRejection, CartSummary};
pub use domain::checkpoint::Checkpoint;
pub use domain::conversation::{
    AssistantMessage, ContentPart, ConversationState, Message, MessageContent, ToolCall,
    ToolResultMessage,
};
pub use domain::product::{Product, ProductId};
pub use domain::session::SessionId;
pub use errors::DomainError;
pub use flows::{FlowEngine, FlowEvent, FlowState, RouteDestination, SupportAgentFlow};
