//! ABOUTME: Node handlers (router/tool/llm/agent) and engine-provided built-in tools
//! ABOUTME: soe-dispatch drives these directly; the Child node kind is implemented there (spec.md §4.8)

pub mod agent;
pub mod builtin_tools;
pub mod child_support;
pub mod contract;
pub mod llm;
pub mod router;
pub mod selection;
pub mod tool;

pub use agent::{execute_agent, AgentDependencies};
pub use builtin_tools::{register_builtin_tools, BuiltinToolState};
pub use child_support::{fan_out_elements, project_child_seed_context};
pub use contract::{parse_response, AgentTurn, ParsedResponse, ResponseContract};
pub use llm::{execute_llm, LlmDependencies};
pub use router::execute_router;
pub use selection::{classify_emissions, select_emissions, semantic_signal_pairs, EmissionMode};
pub use tool::execute_tool;
