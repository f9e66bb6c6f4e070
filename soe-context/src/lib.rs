//! ABOUTME: Context store API layered over soe-core's raw history-list Context
//! ABOUTME: Reserved-namespace guarding, operational/parent-link codecs, and the commit transaction

mod transaction;

pub use transaction::ContextTransaction;

use soe_core::{
    Context, ContextBackend, ExecutionId, Operational, ParentLink, Result, SoeError,
    OPERATIONAL_KEY, PARENT_KEY,
};
use std::sync::Arc;

/// True for the two engine-managed namespaces workflow-authored mutations
/// may never target directly (spec.md §3.2, §4.2).
#[must_use]
pub fn is_reserved_field(field: &str) -> bool {
    field == OPERATIONAL_KEY || field == PARENT_KEY
}

/// Decode the `__operational__` block, if present.
pub fn read_operational(ctx: &Context) -> Result<Option<Operational>> {
    ctx.current(OPERATIONAL_KEY)
        .map(|v| serde_json::from_value(v.clone()))
        .transpose()
        .map_err(|e| SoeError::internal(format!("corrupt __operational__: {e}")))
}

/// Overwrite the `__operational__` block. This replaces rather than appends:
/// the namespace holds a single live counter snapshot, not a value history
/// (spec.md §3.2 calls out `__operational__` as "engine-managed counters",
/// distinct from ordinary workflow fields).
pub fn write_operational(ctx: &mut Context, operational: &Operational) -> Result<()> {
    let encoded = serde_json::to_value(operational)
        .map_err(|e| SoeError::internal(format!("cannot encode __operational__: {e}")))?;
    ctx.raw_mut().insert(OPERATIONAL_KEY.to_string(), vec![encoded]);
    Ok(())
}

/// Decode the `__parent__` block, if present (child executions only).
pub fn read_parent_link(ctx: &Context) -> Result<Option<ParentLink>> {
    ctx.current(PARENT_KEY)
        .map(|v| serde_json::from_value(v.clone()))
        .transpose()
        .map_err(|e| SoeError::internal(format!("corrupt __parent__: {e}")))
}

/// Set the `__parent__` block once, at child-execution creation time.
pub fn write_parent_link(ctx: &mut Context, link: &ParentLink) -> Result<()> {
    let encoded = serde_json::to_value(link)
        .map_err(|e| SoeError::internal(format!("cannot encode __parent__: {e}")))?;
    ctx.raw_mut().insert(PARENT_KEY.to_string(), vec![encoded]);
    Ok(())
}

/// Loads and persists per-execution [`Context`] through a pluggable
/// [`ContextBackend`] (spec.md §6.1). Holds no cache of its own: callers that
/// need one context for the duration of a dispatch loop load it once and
/// pass the owned value through, saving it back after each commit.
pub struct ContextStore<B: ContextBackend> {
    backend: Arc<B>,
}

impl<B: ContextBackend> ContextStore<B> {
    #[must_use]
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }

    /// Load the context for `id`, or a fresh empty one if none exists yet.
    pub async fn load(&self, id: ExecutionId) -> Result<Context> {
        Ok(self.backend.get_context(id).await?.unwrap_or_default())
    }

    pub async fn save(&self, id: ExecutionId, ctx: &Context) -> Result<()> {
        self.backend.save_context(id, ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use dashmap::DashMap;
    use serde_json::json;
    use soe_core::MainExecutionId;

    #[derive(Default)]
    struct MemBackend(DashMap<ExecutionId, Context>);

    #[async_trait]
    impl ContextBackend for MemBackend {
        async fn save_context(&self, id: ExecutionId, ctx: &Context) -> Result<()> {
            self.0.insert(id, ctx.clone());
            Ok(())
        }
        async fn get_context(&self, id: ExecutionId) -> Result<Option<Context>> {
            Ok(self.0.get(&id).map(|e| e.clone()))
        }
    }

    #[tokio::test]
    async fn store_round_trips_through_backend() {
        let store = ContextStore::new(Arc::new(MemBackend::default()));
        let id = ExecutionId::new();
        let mut ctx = Context::new();
        ctx.append("data", json!("hello"));
        store.save(id, &ctx).await.unwrap();

        let loaded = store.load(id).await.unwrap();
        assert_eq!(loaded.current("data"), Some(&json!("hello")));
    }

    #[tokio::test]
    async fn missing_execution_loads_fresh_context() {
        let store = ContextStore::new(Arc::new(MemBackend::default()));
        let loaded = store.load(ExecutionId::new()).await.unwrap();
        assert!(loaded.fields().next().is_none());
    }

    #[test]
    fn operational_round_trips_as_single_snapshot() {
        let mut ctx = Context::new();
        let mut op = Operational::fresh(MainExecutionId::new());
        op.record_signal("START");
        write_operational(&mut ctx, &op).unwrap();
        write_operational(&mut ctx, &op).unwrap();

        assert_eq!(ctx.accumulated(OPERATIONAL_KEY).len(), 1);
        let decoded = read_operational(&ctx).unwrap().unwrap();
        assert_eq!(decoded.signals, vec!["START"]);
    }

    #[test]
    fn reserved_fields_are_exactly_operational_and_parent() {
        assert!(is_reserved_field("__operational__"));
        assert!(is_reserved_field("__parent__"));
        assert!(!is_reserved_field("result"));
    }
}
