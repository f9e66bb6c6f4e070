//! ABOUTME: One-JSON-document-per-execution-id backend, rooted at a configurable directory
//! ABOUTME: Grounded on llmspell-config's load_from_file/from_toml round trip, applied per-document instead of once

use async_trait::async_trait;
use soe_core::{
    Context, ContextBackend, ContextSchemaBackend, ConversationHistoryBackend, ConversationTurn,
    ExecutionId, FieldSchema, IdentityBackend, IdentityMap, MainExecutionId, Registry, Result,
    SoeError, WorkflowBackend,
};
use std::path::{Path, PathBuf};

/// Persists every backend document as `<root>/<kind>/<id>.json`. Survives
/// process restart; this is what `soe-cli resume` requires.
pub struct FileBackend {
    root: PathBuf,
}

impl FileBackend {
    pub async fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        for kind in ["context", "registry", "current_workflow", "schema", "identities", "history"] {
            tokio::fs::create_dir_all(root.join(kind))
                .await
                .map_err(|e| SoeError::backend("create backend directory", e.to_string()))?;
        }
        Ok(Self { root })
    }

    fn path(&self, kind: &str, id: impl std::fmt::Display) -> PathBuf {
        self.root.join(kind).join(format!("{id}.json"))
    }

    async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>> {
        match tokio::fs::read_to_string(path).await {
            Ok(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|e| SoeError::backend("parse stored document", e.to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(SoeError::backend("read stored document", e.to_string())),
        }
    }

    async fn write_json<T: serde::Serialize + Sync>(path: &Path, value: &T) -> Result<()> {
        let encoded = serde_json::to_string_pretty(value)
            .map_err(|e| SoeError::backend("encode document", e.to_string()))?;
        tokio::fs::write(path, encoded)
            .await
            .map_err(|e| SoeError::backend("write stored document", e.to_string()))
    }
}

#[async_trait]
impl ContextBackend for FileBackend {
    async fn save_context(&self, id: ExecutionId, ctx: &Context) -> Result<()> {
        Self::write_json(&self.path("context", id), ctx).await
    }

    async fn get_context(&self, id: ExecutionId) -> Result<Option<Context>> {
        Self::read_json(&self.path("context", id)).await
    }
}

#[async_trait]
impl WorkflowBackend for FileBackend {
    async fn save_workflows_registry(&self, id: ExecutionId, registry: &Registry) -> Result<()> {
        Self::write_json(&self.path("registry", id), registry).await
    }

    async fn get_workflows_registry(&self, id: ExecutionId) -> Result<Option<Registry>> {
        Self::read_json(&self.path("registry", id)).await
    }

    async fn save_current_workflow_name(&self, id: ExecutionId, name: &str) -> Result<()> {
        Self::write_json(&self.path("current_workflow", id), &name).await
    }

    async fn get_current_workflow_name(&self, id: ExecutionId) -> Result<Option<String>> {
        Self::read_json(&self.path("current_workflow", id)).await
    }
}

#[async_trait]
impl ContextSchemaBackend for FileBackend {
    async fn save_schema(&self, id: ExecutionId, schema: &FieldSchema) -> Result<()> {
        Self::write_json(&self.path("schema", id), schema).await
    }

    async fn get_schema(&self, id: ExecutionId) -> Result<Option<FieldSchema>> {
        Self::read_json(&self.path("schema", id)).await
    }
}

#[async_trait]
impl IdentityBackend for FileBackend {
    async fn save_identities(&self, id: ExecutionId, identities: &IdentityMap) -> Result<()> {
        Self::write_json(&self.path("identities", id), identities).await
    }

    async fn get_identities(&self, id: ExecutionId) -> Result<Option<IdentityMap>> {
        Self::read_json(&self.path("identities", id)).await
    }
}

#[async_trait]
impl ConversationHistoryBackend for FileBackend {
    async fn get(&self, id: MainExecutionId) -> Result<Vec<ConversationTurn>> {
        Ok(Self::read_json(&self.path("history", id)).await?.unwrap_or_default())
    }

    async fn append(&self, id: MainExecutionId, turn: ConversationTurn) -> Result<()> {
        let mut turns = self.get(id).await?;
        turns.push(turn);
        self.save(id, turns).await
    }

    async fn save(&self, id: MainExecutionId, turns: Vec<ConversationTurn>) -> Result<()> {
        Self::write_json(&self.path("history", id), &turns).await
    }

    async fn delete(&self, id: MainExecutionId) -> Result<()> {
        match tokio::fs::remove_file(self.path("history", id)).await {
            Ok(()) | Err(_) => Ok(()),
        }
    }
}
