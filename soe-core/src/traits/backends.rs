//! ABOUTME: Backend contracts the kernel depends on (spec.md §6.1)
//! ABOUTME: All string IDs are opaque, all values are JSON-serialisable; out of scope to implement here

use crate::context::Context;
use crate::ids::{ExecutionId, MainExecutionId};
use crate::registry::{FieldSchema, IdentityMap, Registry};
use crate::traits::model_caller::ConversationTurn;
use crate::Result;
use async_trait::async_trait;

#[async_trait]
pub trait ContextBackend: Send + Sync {
    async fn save_context(&self, id: ExecutionId, ctx: &Context) -> Result<()>;
    async fn get_context(&self, id: ExecutionId) -> Result<Option<Context>>;
}

#[async_trait]
pub trait WorkflowBackend: Send + Sync {
    async fn save_workflows_registry(&self, id: ExecutionId, registry: &Registry) -> Result<()>;
    async fn get_workflows_registry(&self, id: ExecutionId) -> Result<Option<Registry>>;
    async fn save_current_workflow_name(&self, id: ExecutionId, name: &str) -> Result<()>;
    async fn get_current_workflow_name(&self, id: ExecutionId) -> Result<Option<String>>;
}

/// Optional: CRUD over `{execution_id -> {field -> schema_entry}}`.
#[async_trait]
pub trait ContextSchemaBackend: Send + Sync {
    async fn save_schema(&self, id: ExecutionId, schema: &FieldSchema) -> Result<()>;
    async fn get_schema(&self, id: ExecutionId) -> Result<Option<FieldSchema>>;
}

/// Optional: CRUD over `{execution_id -> {identity_name -> system_prompt}}`.
#[async_trait]
pub trait IdentityBackend: Send + Sync {
    async fn save_identities(&self, id: ExecutionId, identities: &IdentityMap) -> Result<()>;
    async fn get_identities(&self, id: ExecutionId) -> Result<Option<IdentityMap>>;
}

/// Optional: conversation history, keyed by `main_execution_id` so the whole
/// orchestration tree shares it (spec.md §4.5, §9).
#[async_trait]
pub trait ConversationHistoryBackend: Send + Sync {
    async fn get(&self, id: MainExecutionId) -> Result<Vec<ConversationTurn>>;
    async fn append(&self, id: MainExecutionId, turn: ConversationTurn) -> Result<()>;
    async fn save(&self, id: MainExecutionId, turns: Vec<ConversationTurn>) -> Result<()>;
    async fn delete(&self, id: MainExecutionId) -> Result<()>;
}

/// Optional: structured telemetry/observability sink. The kernel depends on
/// this trait only; wiring a concrete sink is the embedder's concern
/// (spec.md §1 "out of scope: logging setup").
#[async_trait]
pub trait TelemetryBackend: Send + Sync {
    async fn log_event(
        &self,
        execution_id: ExecutionId,
        event_type: &str,
        fields: serde_json::Value,
    );
}
