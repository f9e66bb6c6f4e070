//! ABOUTME: The model-invocation collaborator trait (spec.md §6.3)
//! ABOUTME: The kernel owns structured-output parsing around this; the caller returns raw text

use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Configuration the kernel hands to the model caller for one invocation.
/// Mirrors the fields an `llm`/`agent` node needs rendered before the call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelCallConfig {
    /// Rendered system prompt, if the node configured an `identity`.
    pub system_prompt: Option<String>,
    /// Prior conversation turns shared by `main_execution_id`, present only
    /// when `identity` is set and truthy (spec.md §4.5 "Conversation history").
    pub history: Vec<ConversationTurn>,
    /// JSON schema the response must conform to, when the node has a
    /// structured-output contract (spec.md §4.5 step 2, §4.7 step 1).
    pub response_schema: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: ConversationRole,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConversationRole {
    User,
    Assistant,
}

/// A single model invocation. Out of scope for the kernel itself (spec.md
/// §1); the kernel only depends on this interface.
#[async_trait]
pub trait ModelCaller: Send + Sync {
    /// Call the model with a rendered prompt and the given configuration,
    /// returning the raw response text. The kernel parses/validates the
    /// text against `response_schema` itself; this trait never sees the
    /// schema-parsing logic.
    async fn call(&self, rendered_prompt: &str, config: &ModelCallConfig) -> Result<String>;
}
