//! ABOUTME: The two public entry points of spec.md §2/§4.9: `orchestrate` and `broadcast_signals`
//! ABOUTME: Owns inheritance (config and/or context) and the fresh-vs-reset `main_execution_id` rule

use crate::dispatcher::Dispatcher;
use crate::types::{Backends, Collaborators, ExecutionState};
use soe_core::{
    Context, ContextBackend, ContextSchemaBackend, ExecutionId, FieldSchema, IdentityBackend,
    IdentityMap, MainExecutionId, Operational, Registry, Result, SoeError, Value, WorkflowBackend,
};
use std::collections::HashMap;

/// Configuration for a freshly declared execution — as opposed to one
/// inherited wholesale via `inherit_config_from_id` (spec.md §4.9).
#[derive(Debug, Clone, Default)]
pub struct ExecutionConfig {
    pub registry: Registry,
    pub identities: IdentityMap,
    pub context_schema: FieldSchema,
}

/// Arguments to [`orchestrate`], mirroring spec.md §4.9's parameter list.
#[derive(Debug, Clone, Default)]
pub struct OrchestrateRequest {
    pub initial_workflow_name: String,
    pub initial_signals: Vec<String>,
    pub initial_context: HashMap<String, Value>,
    pub config: Option<ExecutionConfig>,
    pub inherit_config_from_id: Option<ExecutionId>,
    pub inherit_context_from_id: Option<ExecutionId>,
}

/// Start or inherit an execution and run its dispatcher to quiescence
/// (spec.md §2, §4.9). Returns the new `execution_id`.
pub async fn orchestrate(
    request: OrchestrateRequest,
    collaborators: Collaborators,
    backends: Backends,
) -> Result<ExecutionId> {
    if request.config.is_none() && request.inherit_config_from_id.is_none() {
        return Err(SoeError::configuration(
            "orchestrate requires at least one of `config` or `inherit_config_from_id`",
        ));
    }

    let execution_id = ExecutionId::new();

    let (registry, identities, context_schema) = match &request.inherit_config_from_id {
        Some(source_id) => {
            let mut registry = backends
                .workflows
                .get_workflows_registry(*source_id)
                .await?
                .ok_or_else(|| {
                    SoeError::configuration(format!(
                        "inherit_config_from_id '{source_id}' has no stored registry"
                    ))
                })?;
            let mut identities = match &backends.identities {
                Some(backend) => backend.get_identities(*source_id).await?.unwrap_or_default(),
                None => IdentityMap::new(),
            };
            let mut context_schema = match &backends.schema {
                Some(backend) => backend.get_schema(*source_id).await?.unwrap_or_default(),
                None => FieldSchema::new(),
            };
            if let Some(cfg) = &request.config {
                registry = cfg.registry.clone();
                identities = cfg.identities.clone();
                context_schema = cfg.context_schema.clone();
            }
            (registry, identities, context_schema)
        }
        None => {
            let cfg = request.config.clone().expect("checked above");
            (cfg.registry, cfg.identities, cfg.context_schema)
        }
    };

    let (context, main_execution_id) = match &request.inherit_context_from_id {
        Some(source_id) => {
            let inherited = backends
                .context
                .get_context(*source_id)
                .await?
                .ok_or_else(|| {
                    SoeError::configuration(format!(
                        "inherit_context_from_id '{source_id}' has no stored context"
                    ))
                })?;
            let main_execution_id = execution_id.as_main();
            let mut context = inherited;
            soe_context::write_operational(&mut context, &Operational::fresh(main_execution_id))?;
            for (field, value) in &request.initial_context {
                context.append(field, value.clone());
            }
            (context, main_execution_id)
        }
        None => {
            let main_execution_id = execution_id.as_main();
            let mut context = Context::new();
            soe_context::write_operational(&mut context, &Operational::fresh(main_execution_id))?;
            for (field, value) in &request.initial_context {
                context.append(field, value.clone());
            }
            (context, main_execution_id)
        }
    };

    backends
        .workflows
        .save_workflows_registry(execution_id, &registry)
        .await?;
    backends
        .workflows
        .save_current_workflow_name(execution_id, &request.initial_workflow_name)
        .await?;
    if let Some(backend) = &backends.identities {
        backend.save_identities(execution_id, &identities).await?;
    }
    if let Some(backend) = &backends.schema {
        backend.save_schema(execution_id, &context_schema).await?;
    }

    let state = ExecutionState {
        execution_id,
        main_execution_id,
        current_workflow_name: request.initial_workflow_name.clone(),
        context: std::sync::Arc::new(parking_lot::RwLock::new(context)),
        registry: std::sync::Arc::new(parking_lot::RwLock::new(registry)),
        identities: std::sync::Arc::new(parking_lot::RwLock::new(identities)),
        context_schema: std::sync::Arc::new(parking_lot::RwLock::new(context_schema)),
    };

    backends
        .context
        .save_context(execution_id, &state.context.read().clone())
        .await?;

    let dispatcher = Dispatcher::new(state, collaborators, backends);
    dispatcher.run(request.initial_signals).await?;

    Ok(execution_id)
}

/// Resume a previously persisted execution with new signals (spec.md §4.3
/// "Re-entry via `broadcast_signals`", §6.4). Operational counters and
/// signal history are preserved; only a fresh `main_execution_id` (via
/// `inherit_context_from_id`) resets them.
pub async fn broadcast_signals(
    execution_id: ExecutionId,
    signals: Vec<String>,
    collaborators: Collaborators,
    backends: Backends,
) -> Result<()> {
    let context = backends
        .context
        .get_context(execution_id)
        .await?
        .ok_or_else(|| {
            SoeError::configuration(format!("no persisted context for execution '{execution_id}'"))
        })?;
    let operational = soe_context::read_operational(&context)?.ok_or_else(|| {
        SoeError::internal("persisted context is missing __operational__")
    })?;
    let main_execution_id: MainExecutionId = operational.main_execution_id;

    let registry = backends
        .workflows
        .get_workflows_registry(execution_id)
        .await?
        .ok_or_else(|| {
            SoeError::configuration(format!("no persisted registry for execution '{execution_id}'"))
        })?;
    let current_workflow_name = backends
        .workflows
        .get_current_workflow_name(execution_id)
        .await?
        .ok_or_else(|| {
            SoeError::configuration(format!(
                "no persisted current workflow for execution '{execution_id}'"
            ))
        })?;
    let identities = match &backends.identities {
        Some(backend) => backend.get_identities(execution_id).await?.unwrap_or_default(),
        None => IdentityMap::new(),
    };
    let context_schema = match &backends.schema {
        Some(backend) => backend.get_schema(execution_id).await?.unwrap_or_default(),
        None => FieldSchema::new(),
    };

    let state = ExecutionState {
        execution_id,
        main_execution_id,
        current_workflow_name,
        context: std::sync::Arc::new(parking_lot::RwLock::new(context)),
        registry: std::sync::Arc::new(parking_lot::RwLock::new(registry)),
        identities: std::sync::Arc::new(parking_lot::RwLock::new(identities)),
        context_schema: std::sync::Arc::new(parking_lot::RwLock::new(context_schema)),
    };

    let dispatcher = Dispatcher::new(state, collaborators, backends);
    dispatcher.run(signals).await?;
    Ok(())
}
