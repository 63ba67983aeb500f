//! Answer-quality workflow.
//!
//! Role selection, an optional clarification sub-flow, answering, and a
//! quality check with bounded retries. The stage graph is a pure transition
//! function (`machine`); the controller drives it over a single
//! conversation state.
mod controller;
mod hearing;
mod machine;
mod prompts;
mod stages;
mod state;

#[cfg(test)]
mod test_support;

pub use controller::{
    CancelToken, OutcomeStatus, WorkflowController, WorkflowError, WorkflowOptions,
    WorkflowOutcome,
};
pub use hearing::{HumanChannel, ScriptedChannel, StdinChannel};
pub use machine::{Stage, Variant};
pub use state::ConversationState;
