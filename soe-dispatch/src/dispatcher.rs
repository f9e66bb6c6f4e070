//! ABOUTME: The FIFO signal-dispatch drain loop (spec.md §4.3)
//! ABOUTME: Owns one execution's queue; child nodes recurse into a fresh Dispatcher of their own

use crate::child::run_child_node;
use crate::tool_layer::LayeredToolRegistry;
use crate::types::{Backends, Collaborators, ExecutionState};
use parking_lot::RwLock;
use soe_core::{
    ContextBackend, ContextMutation, HandlerOutcome, NodeKind, OperationalDelta, Result, SoeError,
    TelemetryBackend,
};
use soe_nodes::{AgentDependencies, LlmDependencies};
use soe_template::Evaluator;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{info, warn};

/// Drives one execution's signal queue to quiescence. Constructed fresh for
/// every `orchestrate`/`broadcast_signals` call and for every child
/// execution spawned by a `child` node (spec.md §4.8).
pub struct Dispatcher {
    pub(crate) state: ExecutionState,
    pub(crate) collaborators: Collaborators,
    pub(crate) backends: Backends,
    pub(crate) tools: Arc<LayeredToolRegistry>,
    pub(crate) pending_signals: Arc<RwLock<Vec<String>>>,
    pub(crate) pending_tool_call_deltas: Arc<RwLock<u64>>,
}

impl Dispatcher {
    #[must_use]
    pub fn new(state: ExecutionState, collaborators: Collaborators, backends: Backends) -> Self {
        let pending_signals = Arc::new(RwLock::new(Vec::new()));
        let pending_tool_call_deltas = Arc::new(RwLock::new(0u64));
        let layered = LayeredToolRegistry::new(collaborators.tools.clone());

        let state_for_builtins = state.clone();
        let backend_for_builtins = backends.context.clone();
        let workflow_backend_for_builtins = backends.workflows.clone();
        let identity_backend_for_builtins = backends.identities.clone();
        let schema_backend_for_builtins = backends.schema.clone();
        let pending_for_builtins = pending_signals.clone();
        let pending_tool_call_deltas_for_builtins = pending_tool_call_deltas.clone();
        layered.install_builtins(move |weak_tools| soe_nodes::BuiltinToolState {
            registry: state_for_builtins.registry.clone(),
            identities: state_for_builtins.identities.clone(),
            context_schema: state_for_builtins.context_schema.clone(),
            context: state_for_builtins.context.clone(),
            pending_signals: pending_for_builtins,
            pending_tool_call_deltas: pending_tool_call_deltas_for_builtins,
            context_backend: backend_for_builtins,
            workflow_backend: workflow_backend_for_builtins,
            identity_backend: identity_backend_for_builtins,
            schema_backend: schema_backend_for_builtins,
            execution_id: state_for_builtins.execution_id,
            tools: weak_tools,
        });

        Self {
            state,
            collaborators,
            backends,
            tools: layered,
            pending_signals,
            pending_tool_call_deltas,
        }
    }

    /// Run the dispatch loop to quiescence starting from `seed` signals.
    /// Returns every signal emitted by a node handler, in emission order
    /// (the initial seed is not included) — used by parent `child` nodes to
    /// filter `signals_to_parent` (spec.md §4.8 step 4).
    pub async fn run(&self, seed: Vec<String>) -> Result<Vec<String>> {
        let mut queue: VecDeque<String> = seed.into_iter().collect();
        let mut emitted_report = Vec::new();
        let evaluator = Evaluator::new();

        while let Some(signal) = queue.pop_front() {
            self.record_signal(&signal)?;

            let workflow = {
                let registry = self.state.registry.read();
                registry
                    .get(&self.state.current_workflow_name)
                    .cloned()
                    .ok_or_else(|| {
                        SoeError::configuration(format!(
                            "unknown current workflow '{}'",
                            self.state.current_workflow_name
                        ))
                    })?
            };
            let triggered: Vec<_> = workflow.triggered_by(&signal).cloned().collect();

            for node in &triggered {
                let context_snapshot = self.state.context.read().clone();

                let outcome = match &node.kind {
                    NodeKind::Router(cfg) => {
                        soe_nodes::execute_router(node, cfg, &context_snapshot, &evaluator)
                    }
                    NodeKind::Tool(cfg) => {
                        soe_nodes::execute_tool(
                            node,
                            cfg,
                            &context_snapshot,
                            &evaluator,
                            self.tools.as_ref(),
                        )
                        .await
                    }
                    NodeKind::Llm(cfg) => {
                        let identities = self.state.identities.read().clone();
                        let schema = self.state.context_schema.read().clone();
                        let deps = LlmDependencies {
                            model: self.collaborators.model.as_ref(),
                            identities: &identities,
                            context_schema: &schema,
                            history: self.collaborators.history.as_deref(),
                            main_execution_id: self.state.main_execution_id,
                        };
                        soe_nodes::execute_llm(node, cfg, &context_snapshot, &evaluator, &deps)
                            .await
                    }
                    NodeKind::Agent(cfg) => {
                        let identities = self.state.identities.read().clone();
                        let schema = self.state.context_schema.read().clone();
                        let deps = AgentDependencies {
                            model: self.collaborators.model.as_ref(),
                            identities: &identities,
                            context_schema: &schema,
                            history: self.collaborators.history.as_deref(),
                            tools: self.tools.as_ref(),
                            main_execution_id: self.state.main_execution_id,
                        };
                        soe_nodes::execute_agent(node, cfg, &context_snapshot, &evaluator, &deps)
                            .await
                    }
                    NodeKind::Child(cfg) => {
                        run_child_node(self, node, cfg, &context_snapshot, &evaluator).await
                    }
                };

                let mut outcome = match outcome {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        warn!(node = %node.name, error = %e, "fatal failure, aborting dispatch");
                        if let Some(telemetry) = &self.backends.telemetry {
                            telemetry
                                .log_event(
                                    self.state.execution_id,
                                    "node_fatal_error",
                                    serde_json::json!({"node": node.name, "error": e.to_string()}),
                                )
                                .await;
                        }
                        return Err(e);
                    }
                };

                outcome.operational_delta.tool_calls +=
                    std::mem::take(&mut *self.pending_tool_call_deltas.write());

                self.commit(&node.name, &outcome)?;
                self.persist().await?;

                info!(node = %node.name, signals = ?outcome.emitted_signals, "node completed");

                for sig in &outcome.emitted_signals {
                    emitted_report.push(sig.clone());
                    queue.push_back(sig.clone());
                }

                let drained: Vec<String> = self.pending_signals.write().drain(..).collect();
                for sig in drained {
                    emitted_report.push(sig.clone());
                    queue.push_back(sig);
                }
            }
        }

        Ok(emitted_report)
    }

    fn record_signal(&self, signal: &str) -> Result<()> {
        let mut context = self.state.context.write();
        let mut operational = soe_context::read_operational(&context)?.ok_or_else(|| {
            SoeError::internal("context missing __operational__ before dispatch")
        })?;
        operational.record_signal(signal);
        soe_context::write_operational(&mut context, &operational)
    }

    pub(crate) fn commit(&self, node_name: &str, outcome: &HandlerOutcome) -> Result<()> {
        let mut txn = soe_context::ContextTransaction::new();
        txn.stage_all(outcome.mutations.clone())?;
        let mut context = self.state.context.write();
        txn.commit(&mut context, node_name, &outcome.operational_delta)
    }

    pub(crate) async fn persist(&self) -> Result<()> {
        let snapshot = self.state.context.read().clone();
        self.backends
            .context
            .save_context(self.state.execution_id, &snapshot)
            .await
    }

    /// Empty outcome helper, used by the child-node path when a spawn round
    /// produces neither mutations nor emissions.
    #[must_use]
    pub(crate) fn no_op_outcome() -> HandlerOutcome {
        HandlerOutcome {
            emitted_signals: Vec::new(),
            mutations: Vec::new(),
            operational_delta: OperationalDelta::none(),
        }
    }

    #[must_use]
    pub(crate) fn mutation(field: impl Into<String>, value: soe_core::Value) -> ContextMutation {
        ContextMutation::new(field, value)
    }
}
