//! ABOUTME: The handler-invocation result: emitted signals, context mutations, operational deltas
//! ABOUTME: Spec.md §4.3 step 4: "A handler returns (emitted_signals, context_mutations, operational_deltas)"

use crate::operational::OperationalDelta;
use crate::value::Value;

/// A single context write a handler wants committed. Reserved-namespace
/// targets are rejected by the context store (spec.md §4.2), never here.
#[derive(Debug, Clone)]
pub struct ContextMutation {
    pub field: String,
    pub value: Value,
}

impl ContextMutation {
    pub fn new(field: impl Into<String>, value: Value) -> Self {
        Self {
            field: field.into(),
            value,
        }
    }
}

/// What a node handler produces after running to completion. The dispatcher
/// applies `mutations` and `operational_delta` atomically, then enqueues
/// `emitted_signals` in order (spec.md §4.3 steps 5-6).
#[derive(Debug, Clone, Default)]
pub struct HandlerOutcome {
    pub emitted_signals: Vec<String>,
    pub mutations: Vec<ContextMutation>,
    pub operational_delta: OperationalDelta,
}

impl HandlerOutcome {
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn emit(mut self, signal: impl Into<String>) -> Self {
        self.emitted_signals.push(signal.into());
        self
    }

    pub fn mutate(mut self, field: impl Into<String>, value: Value) -> Self {
        self.mutations.push(ContextMutation::new(field, value));
        self
    }
}
