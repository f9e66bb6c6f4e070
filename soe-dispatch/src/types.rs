//! ABOUTME: Per-execution state and the external collaborators/backends the dispatcher threads through
//! ABOUTME: Mirrors spec.md §3.1's list of what an execution owns, plus §6's external interfaces

use parking_lot::RwLock;
use soe_core::{
    Context, ContextBackend, ContextSchemaBackend, ConversationHistoryBackend, ExecutionId,
    FieldSchema, IdentityBackend, IdentityMap, MainExecutionId, ModelCaller, Registry,
    TelemetryBackend, ToolRegistry, WorkflowBackend,
};
use std::sync::Arc;

/// Everything one execution (root or child) owns, per spec.md §3.1. Held
/// behind `Arc<RwLock<_>>` where built-in tools (spec.md §4.10) need to
/// mutate it out-of-band from the current node handler's own staged commit.
#[derive(Clone)]
pub struct ExecutionState {
    pub execution_id: ExecutionId,
    pub main_execution_id: MainExecutionId,
    pub current_workflow_name: String,
    pub context: Arc<RwLock<Context>>,
    pub registry: Arc<RwLock<Registry>>,
    pub identities: Arc<RwLock<IdentityMap>>,
    pub context_schema: Arc<RwLock<FieldSchema>>,
}

/// The collaborators the kernel depends on but never implements (spec.md
/// §1, §6.2, §6.3): model invocation and tool bodies. `tools` is the
/// embedder-supplied registry; the dispatcher layers the engine's own
/// built-ins (spec.md §4.10) on top of it per execution.
#[derive(Clone)]
pub struct Collaborators {
    pub model: Arc<dyn ModelCaller>,
    pub tools: Arc<dyn ToolRegistry>,
    pub history: Option<Arc<dyn ConversationHistoryBackend>>,
}

/// The persistence backends of spec.md §6.1. Only `context` and `workflows`
/// are required; the rest are optional and fall back to the in-memory
/// per-execution state alone (no cross-process durability).
#[derive(Clone)]
pub struct Backends {
    pub context: Arc<dyn ContextBackend>,
    pub workflows: Arc<dyn WorkflowBackend>,
    pub schema: Option<Arc<dyn ContextSchemaBackend>>,
    pub identities: Option<Arc<dyn IdentityBackend>>,
    pub telemetry: Option<Arc<dyn TelemetryBackend>>,
}
