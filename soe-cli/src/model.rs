//! ABOUTME: The CLI's default ModelCaller — real provider wiring is out of scope (spec.md §1)
//! ABOUTME: Mirrors soe-nodes' test-only mocks but fails loudly instead of returning canned text

use async_trait::async_trait;
use soe_core::{ModelCallConfig, ModelCaller, Result, SoeError};

/// Errors on every call. `soe run`/`soe resume` only reach this when a
/// workflow declares an `llm` or `agent` node without the embedder wiring a
/// real [`ModelCaller`] in — which the CLI, as a demo harness, never does.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnconfiguredModelCaller;

#[async_trait]
impl ModelCaller for UnconfiguredModelCaller {
    async fn call(&self, _rendered_prompt: &str, _config: &ModelCallConfig) -> Result<String> {
        Err(SoeError::configuration(
            "this workflow calls a model, but soe-cli has no ModelCaller configured; \
             embed soe-dispatch directly and supply a real one via Collaborators::model",
        ))
    }
}
