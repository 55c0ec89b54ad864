//! Support agent runtime.
//!
//! The cycle alternates between a model reasoning step and tool execution:
//!
//! 1. **Reasoning** (`reasoning`) renders the instruction template and asks the model for
//!    text or tool calls, re-prompting on empty output.
//! 2. **Routing** (`router`) sends the calls to the safe executor or, for cart changes,
//!    to the human gate.
//! 3. **Interrupt** (`interrupt`) persists a checkpoint and waits for `Approve` or
//!    `Deny(reason)` before anything sensitive runs.
//! 4. **Execution** (`executor`) runs tools from the registry and turns correctable
//!    failures into error results the model can react to.
//!
//! State changes are decided by the pure flow in `dermadesk_core::flows`;
//! [`runtime::AgentRuntime`] only performs the actions each transition returns.

pub mod audit;
pub mod catalog_tools;
pub mod errors;
pub mod executor;
pub mod interrupt;
pub mod llm;
pub mod providers;
pub mod reasoning;
pub mod router;
pub mod runtime;
pub mod tools;

pub use errors::AgentError;
pub use interrupt::Decision;
pub use runtime::{AgentRuntime, TurnOutcome, TurnReport};
