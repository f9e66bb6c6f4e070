//! ABOUTME: Child-node sub-orchestration: single spawn and fan-out (spec.md §4.8)
//! ABOUTME: Recurses into a fresh Dispatcher per child; forwarding is folded into the generic commit path

use crate::dispatcher::Dispatcher;
use crate::types::ExecutionState;
use soe_core::{
    ChildNodeConfig, Context, ContextMutation, ExecutionId, HandlerOutcome, Node, OperationalDelta,
    ParentLink, Result,
};
use soe_nodes::{fan_out_elements, project_child_seed_context};
use soe_template::{classify_condition, ConditionKind, Evaluator, View};
use std::sync::Arc;
use tracing::info;

/// Spawn one child (or, with `fan_out_field` set, one child per accumulated
/// element), run each to quiescence, and fold `signals_to_parent` /
/// `context_updates_to_parent` into this node's own [`HandlerOutcome`] so the
/// dispatcher's ordinary commit path applies them atomically alongside the
/// node's own emissions (spec.md §4.8 steps 1-5).
pub async fn run_child_node(
    parent: &Dispatcher,
    node: &Node,
    cfg: &ChildNodeConfig,
    context_view: &Context,
    evaluator: &Evaluator,
) -> Result<HandlerOutcome> {
    let fan_out_values: Vec<Option<soe_core::Value>> = match &cfg.fan_out_field {
        Some(field) => fan_out_elements(context_view, field).into_iter().map(Some).collect(),
        None => vec![None],
    };

    let mut forwarded_signals = Vec::new();
    let mut forwarded_mutations: Vec<ContextMutation> = Vec::new();

    for (index, element) in fan_out_values.into_iter().enumerate() {
        if index > 0 {
            if let Some(interval) = cfg.spawn_interval_duration() {
                tokio::time::sleep(interval).await;
            }
        }

        let mut seed_context = project_child_seed_context(context_view, &cfg.input_fields);
        if let (Some(value), Some(field_name)) = (&element, &cfg.child_input_field) {
            seed_context.append(field_name, value.clone());
        }

        let child_execution_id = ExecutionId::new();
        let parent_link = ParentLink {
            parent_execution_id: parent.state.execution_id,
            main_execution_id: parent.state.main_execution_id,
            signals_to_parent: cfg.signals_to_parent.clone(),
            context_updates_to_parent: cfg.context_updates_to_parent.clone(),
        };
        soe_context::write_parent_link(&mut seed_context, &parent_link)?;
        soe_context::write_operational(
            &mut seed_context,
            &soe_core::Operational::fresh(parent.state.main_execution_id),
        )?;

        let child_state = ExecutionState {
            execution_id: child_execution_id,
            main_execution_id: parent.state.main_execution_id,
            current_workflow_name: cfg.child_workflow_name.clone(),
            context: Arc::new(parking_lot::RwLock::new(seed_context)),
            registry: parent.state.registry.clone(),
            identities: parent.state.identities.clone(),
            context_schema: parent.state.context_schema.clone(),
        };

        info!(
            node = %node.name,
            child_execution_id = %child_execution_id,
            workflow = %cfg.child_workflow_name,
            "spawning child execution"
        );

        let child_dispatcher =
            Dispatcher::new(child_state.clone(), parent.collaborators.clone(), parent.backends.clone());
        let child_emitted = child_dispatcher.run(cfg.child_initial_signals.clone()).await?;

        for signal in &child_emitted {
            if cfg.signals_to_parent.iter().any(|s| s == signal) {
                forwarded_signals.push(signal.clone());
            }
        }

        let child_context = child_state.context.read();
        for field in &cfg.context_updates_to_parent {
            for value in child_context.accumulated(field) {
                forwarded_mutations.push(Dispatcher::mutation(field.clone(), value.clone()));
            }
        }
    }

    let mut working_view = context_view.clone();
    for mutation in &forwarded_mutations {
        working_view.append(&mutation.field, mutation.value.clone());
    }
    let view = View::new(working_view);

    let mut own_emissions = Vec::new();
    for emission in &node.event_emissions {
        let fires = match &emission.condition {
            None => true,
            Some(condition) => match classify_condition(condition) {
                ConditionKind::Template => evaluator.truthy_evaluate(condition, &view)?,
                ConditionKind::Semantic => false,
            },
        };
        if fires {
            own_emissions.push(emission.signal_name.clone());
        }
    }

    let mut outcome = Dispatcher::no_op_outcome();
    outcome.mutations = forwarded_mutations;
    outcome.emitted_signals = forwarded_signals;
    outcome.emitted_signals.extend(own_emissions);
    outcome.operational_delta = OperationalDelta::none();
    Ok(outcome)
}
