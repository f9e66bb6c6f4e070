//! ABOUTME: The opinion-free telemetry sink: log_event as a single tracing span
//! ABOUTME: Mirrors llmspell-core::execution_context::ExecutionContext taking an optional emitter, never a concrete bus

use async_trait::async_trait;
use soe_core::{ExecutionId, TelemetryBackend};

/// Default [`TelemetryBackend`]: every event becomes one `tracing::info!`
/// call. `soe-cli` wires this up unless an embedder supplies its own sink.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingTelemetryBackend;

#[async_trait]
impl TelemetryBackend for TracingTelemetryBackend {
    async fn log_event(&self, execution_id: ExecutionId, event_type: &str, fields: serde_json::Value) {
        tracing::info!(execution_id = %execution_id, event_type, ?fields, "soe telemetry event");
    }
}
