//! ABOUTME: Staged-then-committed mutation batch applied atomically after a node handler runs
//! ABOUTME: Spec.md §4.3 step 5: "context mutations ... are applied atomically before the next signal is dispatched"

use soe_core::{Context, ContextMutation, Operational, OperationalDelta, Result, SoeError};

use crate::is_reserved_field;

/// Collects the mutations and operational counters produced by a single node
/// handler invocation and applies them to a [`Context`] in one step, so a
/// handler that emits signals after a partial failure never leaves the
/// context half-written.
#[derive(Debug, Default)]
pub struct ContextTransaction {
    staged: Vec<ContextMutation>,
}

impl ContextTransaction {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage a mutation. Rejects writes to `__operational__`/`__parent__`
    /// immediately rather than at commit time, so a handler bug surfaces at
    /// the point it called `mutate()`.
    pub fn stage(&mut self, mutation: ContextMutation) -> Result<()> {
        if is_reserved_field(&mutation.field) {
            return Err(SoeError::configuration(format!(
                "node handler attempted to write reserved field '{}'",
                mutation.field
            )));
        }
        self.staged.push(mutation);
        Ok(())
    }

    pub fn stage_all(&mut self, mutations: Vec<ContextMutation>) -> Result<()> {
        for m in mutations {
            self.stage(m)?;
        }
        Ok(())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.staged.is_empty()
    }

    /// Apply every staged mutation to `ctx`, then fold `delta` into the
    /// `__operational__` counters and record one node invocation for `node`.
    pub fn commit(self, ctx: &mut Context, node: &str, delta: &OperationalDelta) -> Result<()> {
        for mutation in self.staged {
            ctx.append(&mutation.field, mutation.value);
        }
        let mut operational = crate::read_operational(ctx)?
            .ok_or_else(|| SoeError::internal("context missing __operational__ before commit"))?;
        operational.record_node_invocation(node);
        operational.llm_calls += delta.llm_calls;
        operational.tool_calls += delta.tool_calls;
        operational.errors += delta.errors;
        crate::write_operational(ctx, &operational)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use soe_core::MainExecutionId;

    fn fresh_ctx() -> Context {
        let mut ctx = Context::new();
        crate::write_operational(&mut ctx, &Operational::fresh(MainExecutionId::new())).unwrap();
        ctx
    }

    #[test]
    fn commit_applies_mutations_and_records_invocation() {
        let mut ctx = fresh_ctx();
        let mut txn = ContextTransaction::new();
        txn.stage(ContextMutation::new("result", json!(42))).unwrap();
        txn.commit(&mut ctx, "my_node", &OperationalDelta::none())
            .unwrap();

        assert_eq!(ctx.current("result"), Some(&json!(42)));
        let operational = crate::read_operational(&ctx).unwrap().unwrap();
        assert_eq!(operational.node_count("my_node"), 1);
    }

    #[test]
    fn stage_rejects_reserved_fields() {
        let mut txn = ContextTransaction::new();
        let err = txn
            .stage(ContextMutation::new("__operational__", json!({})))
            .unwrap_err();
        assert!(matches!(err, SoeError::Configuration { .. }));
    }

    #[test]
    fn commit_folds_operational_delta() {
        let mut ctx = fresh_ctx();
        let txn = ContextTransaction::new();
        let delta = OperationalDelta {
            llm_calls: 1,
            tool_calls: 2,
            errors: 0,
        };
        txn.commit(&mut ctx, "tool_node", &delta).unwrap();
        let operational = crate::read_operational(&ctx).unwrap().unwrap();
        assert_eq!(operational.llm_calls, 1);
        assert_eq!(operational.tool_calls, 2);
    }
}
