//! ABOUTME: Engine-provided built-in tools (spec.md §4.10), registered automatically per execution
//! ABOUTME: Each closes over this execution's live registry/identity/schema/context handles, not a global

use parking_lot::RwLock;
use soe_core::{
    Context, ContextBackend, ContextSchemaBackend, ExecutionId, FieldSchema, FieldSchemaEntry,
    IdentityBackend, IdentityMap, Node, Registry, Result, SoeError, StaticToolRegistry, ToolEntry,
    ToolRegistry, Value, WorkflowBackend, WorkflowDefinition,
};
use std::sync::{Arc, Weak};

/// Per-execution handles the built-in tools mutate or read. Constructed once
/// by the dispatcher when it starts or resumes an execution.
#[derive(Clone)]
pub struct BuiltinToolState {
    pub registry: Arc<RwLock<Registry>>,
    pub identities: Arc<RwLock<IdentityMap>>,
    pub context_schema: Arc<RwLock<FieldSchema>>,
    pub context: Arc<RwLock<Context>>,
    /// Signals staged by `soe_add_signal`, drained into the dispatcher's
    /// queue by the caller after the hosting node handler returns.
    pub pending_signals: Arc<RwLock<Vec<String>>>,
    /// Extra `tool_calls` accrued by `soe_call_tool`'s forwarded call,
    /// drained into the hosting node's `OperationalDelta` by the dispatcher
    /// alongside `pending_signals` (spec.md §4.10).
    pub pending_tool_call_deltas: Arc<RwLock<u64>>,
    pub context_backend: Arc<dyn ContextBackend>,
    /// Persists the mutated registry after every injecting/removing built-in
    /// returns, so the change survives a mid-execution crash (spec.md §9)
    /// and is visible to executions started with `inherit_config_from_id`
    /// (spec.md §4.9).
    pub workflow_backend: Arc<dyn WorkflowBackend>,
    pub identity_backend: Option<Arc<dyn IdentityBackend>>,
    pub schema_backend: Option<Arc<dyn ContextSchemaBackend>>,
    pub execution_id: ExecutionId,
    /// Used by `soe_call_tool`/`soe_get_available_tools` to reach the full
    /// tool set, including the built-ins themselves. `Weak` because the full
    /// registry is the thing that owns these closures; a strong `Arc` here
    /// would make the registry keep itself alive forever.
    pub tools: Weak<dyn ToolRegistry>,
}

fn upgrade_tools(tools: &Weak<dyn ToolRegistry>) -> Result<Arc<dyn ToolRegistry>> {
    tools
        .upgrade()
        .ok_or_else(|| SoeError::internal("tool registry dropped while execution still running"))
}

/// Registers all nineteen engine-provided tools of spec.md §4.10 into
/// `registry`. Call once per execution's own `StaticToolRegistry`.
pub fn register_builtin_tools(registry: &mut StaticToolRegistry, state: BuiltinToolState) {
    macro_rules! register {
        ($name:expr, $state:ident, $body:expr) => {
            let $state = state.clone();
            registry.register($name, ToolEntry::new(Arc::new(move |args: Value| {
                let $state = $state.clone();
                async move { $body(args, $state).await }
            })));
        };
    }

    register!("soe_explore_docs", s, explore_docs);
    register!("soe_get_workflows", s, get_workflows);
    register!("soe_inject_workflow", s, inject_workflow);
    register!("soe_inject_node", s, inject_node);
    register!("soe_remove_workflow", s, remove_workflow);
    register!("soe_remove_node", s, remove_node);
    register!("soe_add_signal", s, add_signal);
    register!("soe_get_context", s, get_context);
    register!("soe_update_context", s, update_context);
    register!("soe_copy_context", s, copy_context);
    register!("soe_list_contexts", s, list_contexts);
    register!("soe_get_identities", s, get_identities);
    register!("soe_inject_identity", s, inject_identity);
    register!("soe_remove_identity", s, remove_identity);
    register!("soe_get_context_schema", s, get_context_schema);
    register!("soe_inject_context_schema_field", s, inject_context_schema_field);
    register!("soe_remove_context_schema_field", s, remove_context_schema_field);
    register!("soe_get_available_tools", s, get_available_tools);
    register!("soe_call_tool", s, call_tool);
}

async fn explore_docs(_args: Value, state: BuiltinToolState) -> Result<Value> {
    Ok(serde_json::json!({
        "tools": [
            "soe_explore_docs", "soe_get_workflows", "soe_inject_workflow", "soe_inject_node",
            "soe_remove_workflow", "soe_remove_node", "soe_add_signal", "soe_get_context",
            "soe_update_context", "soe_copy_context", "soe_list_contexts", "soe_get_identities",
            "soe_inject_identity", "soe_remove_identity", "soe_get_context_schema",
            "soe_inject_context_schema_field", "soe_remove_context_schema_field",
            "soe_get_available_tools", "soe_call_tool",
        ],
        "workflows": state.registry.read().workflow_names(),
    }))
}

async fn get_workflows(_args: Value, state: BuiltinToolState) -> Result<Value> {
    Ok(Value::from(state.registry.read().workflow_names()))
}

fn arg_str<'a>(args: &'a Value, key: &str) -> Result<&'a str> {
    args.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| SoeError::internal(format!("missing or non-string argument '{key}'")))
}

/// Persists the live registry snapshot so an injected/removed node or
/// workflow survives a mid-execution crash and is visible to executions
/// started with `inherit_config_from_id` (spec.md §4.9, §9).
async fn persist_registry(state: &BuiltinToolState) -> Result<()> {
    let snapshot = state.registry.read().clone();
    state
        .workflow_backend
        .save_workflows_registry(state.execution_id, &snapshot)
        .await
}

async fn persist_identities(state: &BuiltinToolState) -> Result<()> {
    if let Some(backend) = &state.identity_backend {
        let snapshot = state.identities.read().clone();
        backend.save_identities(state.execution_id, &snapshot).await?;
    }
    Ok(())
}

async fn persist_context_schema(state: &BuiltinToolState) -> Result<()> {
    if let Some(backend) = &state.schema_backend {
        let snapshot = state.context_schema.read().clone();
        backend.save_schema(state.execution_id, &snapshot).await?;
    }
    Ok(())
}

async fn inject_workflow(args: Value, state: BuiltinToolState) -> Result<Value> {
    let name = arg_str(&args, "workflow_name")?.to_string();
    let definition: WorkflowDefinition = serde_json::from_value(
        args.get("definition")
            .cloned()
            .ok_or_else(|| SoeError::internal("missing 'definition' argument"))?,
    )
    .map_err(|e| SoeError::internal(format!("invalid workflow definition: {e}")))?;
    state.registry.write().insert(name, definition);
    persist_registry(&state).await?;
    Ok(serde_json::json!({"ok": true}))
}

async fn inject_node(args: Value, state: BuiltinToolState) -> Result<Value> {
    let workflow_name = arg_str(&args, "workflow_name")?.to_string();
    let node: Node = serde_json::from_value(
        args.get("node")
            .cloned()
            .ok_or_else(|| SoeError::internal("missing 'node' argument"))?,
    )
    .map_err(|e| SoeError::internal(format!("invalid node: {e}")))?;

    let mut registry = state.registry.write();
    let definition = registry
        .get(&workflow_name)
        .cloned()
        .unwrap_or_default();
    let mut nodes: Vec<Node> = definition
        .nodes
        .into_iter()
        .filter(|n| n.name != node.name)
        .collect();
    nodes.push(node);
    registry.insert(workflow_name, WorkflowDefinition { nodes });
    drop(registry);
    persist_registry(&state).await?;
    Ok(serde_json::json!({"ok": true}))
}

async fn remove_workflow(args: Value, state: BuiltinToolState) -> Result<Value> {
    let name = arg_str(&args, "workflow_name")?;
    let removed = state.registry.write().remove(name).is_some();
    persist_registry(&state).await?;
    Ok(serde_json::json!({"removed": removed}))
}

async fn remove_node(args: Value, state: BuiltinToolState) -> Result<Value> {
    let workflow_name = arg_str(&args, "workflow_name")?.to_string();
    let node_name = arg_str(&args, "node_name")?.to_string();

    let mut registry = state.registry.write();
    let Some(definition) = registry.get(&workflow_name).cloned() else {
        return Ok(serde_json::json!({"removed": false}));
    };
    let before = definition.nodes.len();
    let nodes: Vec<Node> = definition
        .nodes
        .into_iter()
        .filter(|n| n.name != node_name)
        .collect();
    let removed = nodes.len() < before;
    registry.insert(workflow_name, WorkflowDefinition { nodes });
    drop(registry);
    persist_registry(&state).await?;
    Ok(serde_json::json!({"removed": removed}))
}

async fn add_signal(args: Value, state: BuiltinToolState) -> Result<Value> {
    let signal = arg_str(&args, "signal")?.to_string();
    state.pending_signals.write().push(signal);
    Ok(serde_json::json!({"queued": true}))
}

async fn get_context(_args: Value, state: BuiltinToolState) -> Result<Value> {
    Ok(Value::Object(state.context.read().to_current_value_map()))
}

async fn update_context(args: Value, state: BuiltinToolState) -> Result<Value> {
    let field = arg_str(&args, "field")?.to_string();
    if soe_context::is_reserved_field(&field) {
        return Err(SoeError::configuration(format!(
            "cannot write to reserved field '{field}'"
        )));
    }
    let value = args
        .get("value")
        .cloned()
        .ok_or_else(|| SoeError::internal("missing 'value' argument"))?;
    state.context.write().append(&field, value);
    Ok(serde_json::json!({"ok": true}))
}

async fn copy_context(args: Value, state: BuiltinToolState) -> Result<Value> {
    let from_id_str = arg_str(&args, "from_execution_id")?;
    let from_id: ExecutionId = serde_json::from_value(Value::String(from_id_str.to_string()))
        .map_err(|e| SoeError::internal(format!("invalid 'from_execution_id': {e}")))?;
    let fields: Vec<String> = match args.get("fields") {
        Some(v) => serde_json::from_value(v.clone())
            .map_err(|e| SoeError::internal(format!("invalid 'fields': {e}")))?,
        None => Vec::new(),
    };

    let source = state
        .context_backend
        .get_context(from_id)
        .await?
        .ok_or_else(|| SoeError::internal(format!("no context found for '{from_id_str}'")))?;

    let mut copied = Vec::new();
    let mut target = state.context.write();
    for field in &fields {
        if let Some(value) = source.current(field) {
            target.append(field, value.clone());
            copied.push(field.clone());
        }
    }
    Ok(serde_json::json!({"copied_fields": copied}))
}

/// The minimal [`ContextBackend`] contract (spec.md §6.1) has no
/// enumeration operation, so this built-in cannot discover other
/// executions' ids through it; it returns this execution's own id only.
async fn list_contexts(_args: Value, state: BuiltinToolState) -> Result<Value> {
    Ok(serde_json::json!([state.execution_id.to_string()]))
}

async fn get_identities(_args: Value, state: BuiltinToolState) -> Result<Value> {
    serde_json::to_value(&*state.identities.read())
        .map_err(|e| SoeError::internal(format!("cannot encode identities: {e}")))
}

async fn inject_identity(args: Value, state: BuiltinToolState) -> Result<Value> {
    let name = arg_str(&args, "name")?.to_string();
    let system_prompt = arg_str(&args, "system_prompt")?.to_string();
    state.identities.write().insert(name, system_prompt);
    persist_identities(&state).await?;
    Ok(serde_json::json!({"ok": true}))
}

async fn remove_identity(args: Value, state: BuiltinToolState) -> Result<Value> {
    let name = arg_str(&args, "name")?;
    let removed = state.identities.write().remove(name).is_some();
    persist_identities(&state).await?;
    Ok(serde_json::json!({"removed": removed}))
}

async fn get_context_schema(_args: Value, state: BuiltinToolState) -> Result<Value> {
    serde_json::to_value(&*state.context_schema.read())
        .map_err(|e| SoeError::internal(format!("cannot encode context schema: {e}")))
}

async fn inject_context_schema_field(args: Value, state: BuiltinToolState) -> Result<Value> {
    let field = arg_str(&args, "field")?.to_string();
    let entry: FieldSchemaEntry = serde_json::from_value(
        args.get("entry")
            .cloned()
            .ok_or_else(|| SoeError::internal("missing 'entry' argument"))?,
    )
    .map_err(|e| SoeError::internal(format!("invalid schema entry: {e}")))?;
    state.context_schema.write().insert(field, entry);
    persist_context_schema(&state).await?;
    Ok(serde_json::json!({"ok": true}))
}

async fn remove_context_schema_field(args: Value, state: BuiltinToolState) -> Result<Value> {
    let field = arg_str(&args, "field")?;
    let removed = state.context_schema.write().remove(field).is_some();
    persist_context_schema(&state).await?;
    Ok(serde_json::json!({"removed": removed}))
}

async fn get_available_tools(_args: Value, state: BuiltinToolState) -> Result<Value> {
    Ok(Value::from(upgrade_tools(&state.tools)?.names()))
}

/// Dynamically resolves and calls a tool by name. The outer call into
/// `soe_call_tool` itself already increments `tool_calls` through the normal
/// tool/agent node accounting; the forwarded call underneath it is a second,
/// separate invocation, so it stages its own `+1` onto
/// `pending_tool_call_deltas`, the same side channel `soe_add_signal` uses
/// for staged signals. The dispatcher folds it into the hosting node's
/// `OperationalDelta` once the handler returns (spec.md §4.10).
async fn call_tool(args: Value, state: BuiltinToolState) -> Result<Value> {
    let tool_name = arg_str(&args, "tool_name")?.to_string();
    let arguments = args.get("arguments").cloned().unwrap_or(Value::Null);
    let entry = upgrade_tools(&state.tools)?
        .get(&tool_name)
        .ok_or_else(|| SoeError::internal(format!("tool '{tool_name}' is not registered")))?;
    let result = entry.function.call(arguments).await;
    *state.pending_tool_call_deltas.write() += 1;
    result
}
