//! ABOUTME: Cross-referential load-time validation beyond what YAML parsing alone catches
//! ABOUTME: Spec.md §7 "Configuration error": absent child workflow, contradictory tool params, non-template router conditions

use soe_core::{NodeKind, Registry, Result, SoeError};
use soe_template::{classify_condition, ConditionKind};

/// Run every load-time check spec.md §7 names. Called once, right after
/// parsing, before the registry is handed to the dispatcher.
pub fn validate_registry(registry: &Registry) -> Result<()> {
    for workflow_name in registry.workflow_names() {
        let definition = registry
            .get(&workflow_name)
            .expect("name came from workflow_names()");
        for node in &definition.nodes {
            match &node.kind {
                NodeKind::Router(_) => validate_router_conditions(&workflow_name, node)?,
                NodeKind::Tool(tool) => validate_tool_parameters(&workflow_name, node, tool)?,
                NodeKind::Child(child) => {
                    validate_child_reference(&workflow_name, node, child, registry)?;
                }
                NodeKind::Llm(_) | NodeKind::Agent(_) => {}
            }
        }
    }
    Ok(())
}

/// Resolved Open Question (spec.md §9): a router emission with a non-template
/// condition is rejected rather than silently treated as always-emit.
fn validate_router_conditions(workflow_name: &str, node: &soe_core::Node) -> Result<()> {
    for emission in &node.event_emissions {
        if let Some(condition) = &emission.condition {
            if classify_condition(condition) != ConditionKind::Template {
                return Err(SoeError::configuration(format!(
                    "workflow '{workflow_name}' router node '{}': emission '{}' has a non-template condition; routers only accept template conditions or none",
                    node.name, emission.signal_name
                )));
            }
        }
    }
    Ok(())
}

fn validate_tool_parameters(
    workflow_name: &str,
    node: &soe_core::Node,
    tool: &soe_core::ToolNodeConfig,
) -> Result<()> {
    if tool.parameters.is_some() && tool.context_parameter_field.is_some() {
        return Err(SoeError::configuration(format!(
            "workflow '{workflow_name}' tool node '{}': 'parameters' and 'context_parameter_field' are mutually exclusive",
            node.name
        )));
    }
    Ok(())
}

fn validate_child_reference(
    workflow_name: &str,
    node: &soe_core::Node,
    child: &soe_core::ChildNodeConfig,
    registry: &Registry,
) -> Result<()> {
    if !registry.contains(&child.child_workflow_name) {
        return Err(SoeError::configuration(format!(
            "workflow '{workflow_name}' child node '{}': references unknown workflow '{}'",
            node.name, child.child_workflow_name
        )));
    }
    Ok(())
}
