pub mod engine;
pub mod states;

pub use engine::{FlowDefinition, FlowEngine, FlowTransitionError, SupportAgentFlow};
pub use states::{
    FlowAction, FlowContext, FlowEvent, FlowState, RouteDestination, TransitionOutcome,
};
