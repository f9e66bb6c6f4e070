//! ABOUTME: Workflow registry data model (spec.md §3.3, §3.4, §3.5, §6.5)
//! ABOUTME: Pure data; loading/validation lives in soe-registry, execution lives in soe-nodes

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// One emission entry: a signal name plus an optional condition.
/// A condition containing template delimiters is template-style; any other
/// non-empty string is a semantic description (spec.md §6.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Emission {
    pub signal_name: String,
    #[serde(default)]
    pub condition: Option<String>,
}

fn default_llm_retries() -> u32 {
    3
}

/// `router` node: pure control flow, never mutates context (spec.md §4.4).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RouterNodeConfig {}

/// `tool` node (spec.md §4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolNodeConfig {
    pub tool_name: String,
    #[serde(default)]
    pub parameters: Option<HashMap<String, String>>,
    #[serde(default)]
    pub context_parameter_field: Option<String>,
    #[serde(default)]
    pub output_field: Option<String>,
}

/// `llm` node (spec.md §4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmNodeConfig {
    pub prompt: String,
    #[serde(default)]
    pub identity: Option<String>,
    #[serde(default)]
    pub output_field: Option<String>,
    #[serde(default = "default_llm_retries")]
    pub retries: u32,
    #[serde(default)]
    pub llm_failure_signal: Option<String>,
}

/// `agent` node: bounded multi-turn model + tools loop (spec.md §4.7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentNodeConfig {
    pub prompt: String,
    #[serde(default)]
    pub identity: Option<String>,
    #[serde(default)]
    pub tools: Vec<String>,
    #[serde(default)]
    pub output_field: Option<String>,
    #[serde(default = "default_llm_retries")]
    pub retries: u32,
    #[serde(default)]
    pub llm_failure_signal: Option<String>,
    /// Engine-level safety knob (spec.md §9 "Open question — agent turn
    /// cap"). `None` means unbounded beyond the `retries` budget, matching
    /// the documented behavior; embedders opt into a ceiling explicitly.
    #[serde(default)]
    pub max_tool_turns: Option<usize>,
}

/// `child` node: sub-orchestration, including fan-out (spec.md §4.8).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChildNodeConfig {
    pub child_workflow_name: String,
    #[serde(default)]
    pub child_initial_signals: Vec<String>,
    #[serde(default)]
    pub input_fields: Vec<String>,
    #[serde(default)]
    pub signals_to_parent: Vec<String>,
    #[serde(default)]
    pub context_updates_to_parent: Vec<String>,
    #[serde(default)]
    pub fan_out_field: Option<String>,
    #[serde(default)]
    pub child_input_field: Option<String>,
    #[serde(default)]
    pub spawn_interval: Option<f64>,
}

impl ChildNodeConfig {
    #[must_use]
    pub fn spawn_interval_duration(&self) -> Option<Duration> {
        self.spawn_interval.map(Duration::from_secs_f64)
    }
}

/// Type-specific node configuration, tagged by `node_type` (spec.md §3.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "node_type", rename_all = "lowercase")]
pub enum NodeKind {
    Router(RouterNodeConfig),
    Tool(ToolNodeConfig),
    Llm(LlmNodeConfig),
    Agent(AgentNodeConfig),
    Child(ChildNodeConfig),
}

impl NodeKind {
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            NodeKind::Router(_) => "router",
            NodeKind::Tool(_) => "tool",
            NodeKind::Llm(_) => "llm",
            NodeKind::Agent(_) => "agent",
            NodeKind::Child(_) => "child",
        }
    }
}

/// A single node in a workflow (spec.md §3.4). `name` is populated from the
/// map key when a `WorkflowDefinition` is loaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    #[serde(default)]
    pub name: String,
    pub event_triggers: Vec<String>,
    #[serde(default)]
    pub event_emissions: Vec<Emission>,
    #[serde(flatten)]
    pub kind: NodeKind,
}

/// A named mapping of node names to node configurations (spec.md §3.3).
/// Node iteration order follows declaration order in the source document,
/// which is the tiebreak used everywhere in the kernel (spec.md §4.3 step 3,
/// §5); `nodes` therefore preserves insertion order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    pub nodes: Vec<Node>,
}

impl WorkflowDefinition {
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.name == name)
    }

    /// Nodes whose `event_triggers` contains `signal`, in declared order.
    #[must_use]
    pub fn triggered_by<'a>(&'a self, signal: &'a str) -> impl Iterator<Item = &'a Node> {
        self.nodes
            .iter()
            .filter(move |n| n.event_triggers.iter().any(|t| t == signal))
    }
}

/// Workflow name -> workflow definition. Frozen as a per-execution snapshot
/// at start or inheritance time (spec.md §3.3); subsequent in-flight edits
/// via the injection API (spec.md §4.10) mutate this snapshot only.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Registry(HashMap<String, WorkflowDefinition>);

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, workflow_name: &str) -> Option<&WorkflowDefinition> {
        self.0.get(workflow_name)
    }

    pub fn insert(&mut self, workflow_name: impl Into<String>, definition: WorkflowDefinition) {
        self.0.insert(workflow_name.into(), definition);
    }

    pub fn remove(&mut self, workflow_name: &str) -> Option<WorkflowDefinition> {
        self.0.remove(workflow_name)
    }

    #[must_use]
    pub fn workflow_names(&self) -> Vec<String> {
        self.0.keys().cloned().collect()
    }

    #[must_use]
    pub fn contains(&self, workflow_name: &str) -> bool {
        self.0.contains_key(workflow_name)
    }
}

/// Identity name -> system-prompt string (spec.md §3.5), keyed externally by
/// `main_execution_id`.
pub type IdentityMap = HashMap<String, String>;

/// JSON-schema-ish field type (spec.md §3.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Integer,
    Number,
    Boolean,
    Object,
    List,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldSchemaEntry {
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub properties: Option<serde_json::Value>,
    #[serde(default)]
    pub items: Option<serde_json::Value>,
}

/// Field name -> schema entry (spec.md §3.5), keyed externally by
/// `main_execution_id`.
pub type FieldSchema = HashMap<String, FieldSchemaEntry>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn triggered_by_preserves_declaration_order() {
        let mut def = WorkflowDefinition::default();
        for (name, trigger) in [("c", "S"), ("a", "S"), ("b", "S")] {
            def.nodes.push(Node {
                name: name.to_string(),
                event_triggers: vec![trigger.to_string()],
                event_emissions: vec![],
                kind: NodeKind::Router(RouterNodeConfig::default()),
            });
        }
        let order: Vec<&str> = def.triggered_by("S").map(|n| n.name.as_str()).collect();
        assert_eq!(order, vec!["c", "a", "b"]);
    }

    #[test]
    fn registry_round_trips_through_serde() {
        let mut registry = Registry::new();
        let mut def = WorkflowDefinition::default();
        def.nodes.push(Node {
            name: "v".to_string(),
            event_triggers: vec!["START".to_string()],
            event_emissions: vec![Emission {
                signal_name: "DONE".to_string(),
                condition: None,
            }],
            kind: NodeKind::Router(RouterNodeConfig::default()),
        });
        registry.insert("main", def);

        let yaml = serde_yaml::to_string(&registry).unwrap();
        let reloaded: Registry = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(reloaded.get("main").unwrap().nodes.len(), 1);
    }
}
