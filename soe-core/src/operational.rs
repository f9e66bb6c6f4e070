//! ABOUTME: The reserved `__operational__` and `__parent__` context namespaces
//! ABOUTME: Engine-managed counters and parent-linkage data (spec.md §3.2)

use crate::ids::{ExecutionId, MainExecutionId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Engine-managed operational state. Workflows may read this namespace;
/// writes from workflow code are rejected by the context store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Operational {
    /// Every signal actually dispatched, in dispatch order (spec.md §3.2, §4.3 step 2).
    pub signals: Vec<String>,
    /// Node name -> completed-invocation count, incremented regardless of outcome.
    pub nodes: HashMap<String, u64>,
    /// Incremented once per model invocation, including each agent turn.
    pub llm_calls: u64,
    /// Incremented once per tool invocation, including tools called by agents.
    pub tool_calls: u64,
    /// Incremented once per raised failure absorbed by a failure-signal path.
    pub errors: u64,
    pub main_execution_id: MainExecutionId,
}

impl Operational {
    /// A freshly initialized operational block, as required on every root
    /// `orchestrate` call and on every context inheritance (spec.md §4.9, §8).
    #[must_use]
    pub fn fresh(main_execution_id: MainExecutionId) -> Self {
        Self {
            signals: Vec::new(),
            nodes: HashMap::new(),
            llm_calls: 0,
            tool_calls: 0,
            errors: 0,
            main_execution_id,
        }
    }

    pub fn record_signal(&mut self, signal: &str) {
        self.signals.push(signal.to_string());
    }

    pub fn record_node_invocation(&mut self, node: &str) {
        *self.nodes.entry(node.to_string()).or_insert(0) += 1;
    }

    pub fn node_count(&self, node: &str) -> u64 {
        self.nodes.get(node).copied().unwrap_or(0)
    }
}

/// Present only in child contexts (spec.md §3.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParentLink {
    pub parent_execution_id: ExecutionId,
    pub main_execution_id: MainExecutionId,
    pub signals_to_parent: Vec<String>,
    pub context_updates_to_parent: Vec<String>,
}

/// Per-handler operational deltas, applied atomically alongside context
/// mutations after a handler completes (spec.md §4.3 step 5).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OperationalDelta {
    pub llm_calls: u64,
    pub tool_calls: u64,
    pub errors: u64,
}

impl OperationalDelta {
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }
}

/// Reserved context key holding the `Operational` block.
pub const OPERATIONAL_KEY: &str = "__operational__";
/// Reserved context key holding the `ParentLink` block (child executions only).
pub const PARENT_KEY: &str = "__parent__";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_operational_has_zeroed_counters() {
        let op = Operational::fresh(MainExecutionId::new());
        assert!(op.signals.is_empty());
        assert_eq!(op.llm_calls, 0);
        assert_eq!(op.tool_calls, 0);
        assert_eq!(op.errors, 0);
    }

    #[test]
    fn node_invocations_accumulate_per_name() {
        let mut op = Operational::fresh(MainExecutionId::new());
        op.record_node_invocation("router_a");
        op.record_node_invocation("router_a");
        op.record_node_invocation("router_b");
        assert_eq!(op.node_count("router_a"), 2);
        assert_eq!(op.node_count("router_b"), 1);
        assert_eq!(op.node_count("missing"), 0);
    }

    #[test]
    fn signals_preserve_dispatch_order() {
        let mut op = Operational::fresh(MainExecutionId::new());
        op.record_signal("START");
        op.record_signal("HAS");
        op.record_signal("DONE");
        assert_eq!(op.signals, vec!["START", "HAS", "DONE"]);
    }
}
