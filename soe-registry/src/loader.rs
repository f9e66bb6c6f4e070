//! ABOUTME: YAML document parsing into the soe-core registry data model
//! ABOUTME: Node order inside a workflow is load-bearing, so nodes are walked as an ordered mapping

use soe_core::{
    Emission, FieldSchema, IdentityMap, Node, NodeKind, Registry, Result, SoeError,
    WorkflowDefinition,
};
use std::path::Path;

/// The parsed, not-yet-validated contents of a workflow document
/// (spec.md §6.5): `workflows` (required), `context_schema`, `identities`.
#[derive(Debug, Clone, Default)]
pub struct RegistryDocument {
    pub registry: Registry,
    pub context_schema: FieldSchema,
    pub identities: IdentityMap,
}

impl RegistryDocument {
    pub async fn load_from_file(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            SoeError::configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let root: serde_yaml::Value = serde_yaml::from_str(content)
            .map_err(|e| SoeError::configuration(format!("invalid YAML: {e}")))?;
        let root = root.as_mapping().ok_or_else(|| {
            SoeError::configuration("document root must be a mapping".to_string())
        })?;

        let workflows_value = root
            .get("workflows")
            .ok_or_else(|| SoeError::configuration("missing required section 'workflows'"))?;
        let registry = parse_workflows(workflows_value)?;

        let context_schema = match root.get("context_schema") {
            Some(v) => serde_yaml::from_value(v.clone())
                .map_err(|e| SoeError::configuration(format!("invalid context_schema: {e}")))?,
            None => FieldSchema::default(),
        };

        let identities = match root.get("identities") {
            Some(v) => serde_yaml::from_value(v.clone())
                .map_err(|e| SoeError::configuration(format!("invalid identities: {e}")))?,
            None => IdentityMap::default(),
        };

        Ok(Self {
            registry,
            context_schema,
            identities,
        })
    }
}

fn parse_workflows(value: &serde_yaml::Value) -> Result<Registry> {
    let mapping = value
        .as_mapping()
        .ok_or_else(|| SoeError::configuration("'workflows' must be a mapping"))?;

    let mut registry = Registry::new();
    for (name_value, def_value) in mapping {
        let name = name_value.as_str().ok_or_else(|| {
            SoeError::configuration("workflow names must be strings")
        })?;
        let definition = parse_workflow_definition(name, def_value)?;
        registry.insert(name, definition);
    }
    Ok(registry)
}

fn parse_workflow_definition(
    workflow_name: &str,
    value: &serde_yaml::Value,
) -> Result<WorkflowDefinition> {
    let mapping = value.as_mapping().ok_or_else(|| {
        SoeError::configuration(format!("workflow '{workflow_name}' must be a mapping"))
    })?;
    let nodes_value = mapping.get("nodes").ok_or_else(|| {
        SoeError::configuration(format!(
            "workflow '{workflow_name}' is missing required field 'nodes'"
        ))
    })?;
    let nodes_mapping = nodes_value.as_mapping().ok_or_else(|| {
        SoeError::configuration(format!("workflow '{workflow_name}'.nodes must be a mapping"))
    })?;

    let mut nodes = Vec::with_capacity(nodes_mapping.len());
    for (node_name_value, node_value) in nodes_mapping {
        let node_name = node_name_value.as_str().ok_or_else(|| {
            SoeError::configuration(format!(
                "workflow '{workflow_name}': node names must be strings"
            ))
        })?;
        nodes.push(parse_node(workflow_name, node_name, node_value)?);
    }
    Ok(WorkflowDefinition { nodes })
}

fn parse_node(workflow_name: &str, node_name: &str, value: &serde_yaml::Value) -> Result<Node> {
    reject_unknown_fields(workflow_name, node_name, value)?;

    let mapping = value.as_mapping().ok_or_else(|| {
        SoeError::configuration(format!(
            "workflow '{workflow_name}' node '{node_name}' must be a mapping"
        ))
    })?;

    let event_triggers = match mapping.get("event_triggers") {
        Some(v) => serde_yaml::from_value(v.clone()).map_err(|e| {
            SoeError::configuration(format!(
                "workflow '{workflow_name}' node '{node_name}': invalid event_triggers: {e}"
            ))
        })?,
        None => Vec::new(),
    };
    let event_emissions: Vec<Emission> = match mapping.get("event_emissions") {
        Some(v) => serde_yaml::from_value(v.clone()).map_err(|e| {
            SoeError::configuration(format!(
                "workflow '{workflow_name}' node '{node_name}': invalid event_emissions: {e}"
            ))
        })?,
        None => Vec::new(),
    };
    let kind: NodeKind = serde_yaml::from_value(value.clone()).map_err(|e| {
        SoeError::configuration(format!(
            "workflow '{workflow_name}' node '{node_name}': {e}"
        ))
    })?;

    Ok(Node {
        name: node_name.to_string(),
        event_triggers,
        event_emissions,
        kind,
    })
}

/// `NodeKind`'s `#[serde(flatten)]` placement on [`Node`] rules out
/// `#[serde(deny_unknown_fields)]` (serde rejects the combination), so
/// unrecognized keys are caught here instead, against the field set declared
/// for the node's own `node_type` (spec.md §6.5: "unknown fields are
/// rejected at load time").
fn reject_unknown_fields(workflow_name: &str, node_name: &str, value: &serde_yaml::Value) -> Result<()> {
    let mapping = value.as_mapping().ok_or_else(|| {
        SoeError::configuration(format!(
            "workflow '{workflow_name}' node '{node_name}' must be a mapping"
        ))
    })?;
    let node_type = mapping
        .get("node_type")
        .and_then(serde_yaml::Value::as_str)
        .ok_or_else(|| {
            SoeError::configuration(format!(
                "workflow '{workflow_name}' node '{node_name}' is missing required field 'node_type'"
            ))
        })?;
    let allowed = allowed_fields_for(node_type).ok_or_else(|| {
        SoeError::configuration(format!(
            "workflow '{workflow_name}' node '{node_name}' has unknown node_type '{node_type}'"
        ))
    })?;

    for key in mapping.keys() {
        let key = key.as_str().ok_or_else(|| {
            SoeError::configuration(format!(
                "workflow '{workflow_name}' node '{node_name}': field names must be strings"
            ))
        })?;
        if !allowed.contains(&key) {
            return Err(SoeError::configuration(format!(
                "workflow '{workflow_name}' node '{node_name}': unknown field '{key}' for node_type '{node_type}'"
            )));
        }
    }
    Ok(())
}

const COMMON_FIELDS: &[&str] = &["node_type", "event_triggers", "event_emissions"];

fn allowed_fields_for(node_type: &str) -> Option<Vec<&'static str>> {
    let specific: &[&str] = match node_type {
        "router" => &[],
        "tool" => &[
            "tool_name",
            "parameters",
            "context_parameter_field",
            "output_field",
        ],
        "llm" => &[
            "prompt",
            "identity",
            "output_field",
            "retries",
            "llm_failure_signal",
        ],
        "agent" => &[
            "prompt",
            "identity",
            "tools",
            "output_field",
            "retries",
            "llm_failure_signal",
            "max_tool_turns",
        ],
        "child" => &[
            "child_workflow_name",
            "child_initial_signals",
            "input_fields",
            "signals_to_parent",
            "context_updates_to_parent",
            "fan_out_field",
            "child_input_field",
            "spawn_interval",
        ],
        _ => return None,
    };
    Some(COMMON_FIELDS.iter().chain(specific).copied().collect())
}
