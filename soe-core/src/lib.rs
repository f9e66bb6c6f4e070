//! ABOUTME: Shared types, error, and backend/collaborator traits for the SOE orchestration kernel
//! ABOUTME: Foundation layer: every other soe-* crate depends on this one and nothing depends on it

pub mod context;
pub mod error;
pub mod ids;
pub mod logging;
pub mod operational;
pub mod outcome;
pub mod registry;
pub mod value;

pub mod traits {
    pub mod backends;
    pub mod model_caller;
    pub mod tool_registry;
}

pub use context::Context;
pub use error::{Result, SoeError};
pub use ids::{ExecutionId, MainExecutionId};
pub use operational::{Operational, OperationalDelta, ParentLink, OPERATIONAL_KEY, PARENT_KEY};
pub use outcome::{ContextMutation, HandlerOutcome};
pub use registry::{
    AgentNodeConfig, ChildNodeConfig, Emission, FieldSchema, FieldSchemaEntry, FieldType,
    IdentityMap, LlmNodeConfig, Node, NodeKind, Registry, RouterNodeConfig, ToolNodeConfig,
    WorkflowDefinition,
};
pub use traits::backends::{
    ContextBackend, ContextSchemaBackend, ConversationHistoryBackend, IdentityBackend,
    TelemetryBackend, WorkflowBackend,
};
pub use traits::model_caller::{ConversationRole, ConversationTurn, ModelCallConfig, ModelCaller};
pub use traits::tool_registry::{StaticToolRegistry, ToolEntry, ToolFn, ToolRegistry};
pub use value::{is_truthy, Value};
