//! ABOUTME: DashMap-backed implementation of every backend trait (spec.md §6.1)
//! ABOUTME: Grounded on llmspell-events::bus::EventBus's Arc<DashMap<_>> per-key concurrent state

use async_trait::async_trait;
use dashmap::DashMap;
use soe_core::{
    Context, ContextBackend, ContextSchemaBackend, ConversationHistoryBackend, ConversationTurn,
    ExecutionId, FieldSchema, IdentityBackend, IdentityMap, MainExecutionId, Registry, Result,
    TelemetryBackend, WorkflowBackend,
};

/// The default backend: nothing survives process restart, which is exactly
/// right for `soe-dispatch`'s own integration tests and for `soe-cli run`
/// one-shot invocations that don't need `resume`.
#[derive(Default)]
pub struct InMemoryBackend {
    context: DashMap<ExecutionId, Context>,
    registry: DashMap<ExecutionId, Registry>,
    current_workflow: DashMap<ExecutionId, String>,
    schema: DashMap<ExecutionId, FieldSchema>,
    identities: DashMap<ExecutionId, IdentityMap>,
    history: DashMap<MainExecutionId, Vec<ConversationTurn>>,
}

impl InMemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ContextBackend for InMemoryBackend {
    async fn save_context(&self, id: ExecutionId, ctx: &Context) -> Result<()> {
        self.context.insert(id, ctx.clone());
        Ok(())
    }

    async fn get_context(&self, id: ExecutionId) -> Result<Option<Context>> {
        Ok(self.context.get(&id).map(|e| e.clone()))
    }
}

#[async_trait]
impl WorkflowBackend for InMemoryBackend {
    async fn save_workflows_registry(&self, id: ExecutionId, registry: &Registry) -> Result<()> {
        self.registry.insert(id, registry.clone());
        Ok(())
    }

    async fn get_workflows_registry(&self, id: ExecutionId) -> Result<Option<Registry>> {
        Ok(self.registry.get(&id).map(|e| e.clone()))
    }

    async fn save_current_workflow_name(&self, id: ExecutionId, name: &str) -> Result<()> {
        self.current_workflow.insert(id, name.to_string());
        Ok(())
    }

    async fn get_current_workflow_name(&self, id: ExecutionId) -> Result<Option<String>> {
        Ok(self.current_workflow.get(&id).map(|e| e.clone()))
    }
}

#[async_trait]
impl ContextSchemaBackend for InMemoryBackend {
    async fn save_schema(&self, id: ExecutionId, schema: &FieldSchema) -> Result<()> {
        self.schema.insert(id, schema.clone());
        Ok(())
    }

    async fn get_schema(&self, id: ExecutionId) -> Result<Option<FieldSchema>> {
        Ok(self.schema.get(&id).map(|e| e.clone()))
    }
}

#[async_trait]
impl IdentityBackend for InMemoryBackend {
    async fn save_identities(&self, id: ExecutionId, identities: &IdentityMap) -> Result<()> {
        self.identities.insert(id, identities.clone());
        Ok(())
    }

    async fn get_identities(&self, id: ExecutionId) -> Result<Option<IdentityMap>> {
        Ok(self.identities.get(&id).map(|e| e.clone()))
    }
}

#[async_trait]
impl ConversationHistoryBackend for InMemoryBackend {
    async fn get(&self, id: MainExecutionId) -> Result<Vec<ConversationTurn>> {
        Ok(self.history.get(&id).map(|e| e.clone()).unwrap_or_default())
    }

    async fn append(&self, id: MainExecutionId, turn: ConversationTurn) -> Result<()> {
        self.history.entry(id).or_default().push(turn);
        Ok(())
    }

    async fn save(&self, id: MainExecutionId, turns: Vec<ConversationTurn>) -> Result<()> {
        self.history.insert(id, turns);
        Ok(())
    }

    async fn delete(&self, id: MainExecutionId) -> Result<()> {
        self.history.remove(&id);
        Ok(())
    }
}

#[async_trait]
impl TelemetryBackend for InMemoryBackend {
    async fn log_event(&self, execution_id: ExecutionId, event_type: &str, fields: serde_json::Value) {
        tracing::info!(execution_id = %execution_id, event_type, ?fields, "telemetry event");
    }
}
