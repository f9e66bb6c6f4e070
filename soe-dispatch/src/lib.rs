//! ABOUTME: The dispatch loop and orchestrator entry points (spec.md §2, §4.3, §4.8, §4.9)
//! ABOUTME: Ties soe-nodes' handlers and soe-context's store together into one execution's lifecycle

mod child;
mod dispatcher;
mod orchestrator;
mod tool_layer;
mod types;

pub use dispatcher::Dispatcher;
pub use orchestrator::{broadcast_signals, orchestrate, ExecutionConfig, OrchestrateRequest};
pub use tool_layer::LayeredToolRegistry;
pub use types::{Backends, Collaborators, ExecutionState};
