//! ABOUTME: Error types for the SOE orchestration kernel
//! ABOUTME: One variant per §7 error kind, each carrying enough context to locate the failure

use thiserror::Error;

/// Comprehensive error enum for all SOE kernel operations.
#[derive(Debug, Error)]
pub enum SoeError {
    /// Malformed template or condition, surfaced as a fatal failure on the current node.
    #[error("evaluator error in node '{node}': {message}")]
    Evaluator { node: String, message: String },

    /// Model invocation returned unparseable output after retries were exhausted,
    /// and no `llm_failure_signal` was configured.
    #[error("model-call failure in node '{node}' after {attempts} attempt(s): {message}")]
    ModelCall {
        node: String,
        attempts: u32,
        message: String,
    },

    /// Tool execution raised after its configured retries were exhausted,
    /// and no `failure_signal` was configured for it.
    #[error("tool '{tool}' failed after {attempts} attempt(s): {message}")]
    ToolExecution {
        tool: String,
        attempts: u32,
        message: String,
    },

    /// Backend read/write failure. The kernel never retries these.
    #[error("backend error during {operation}: {message}")]
    Backend { operation: String, message: String },

    /// Rejected at workflow-load time: missing required field, unknown
    /// `node_type`, a reference to an absent child workflow, contradictory
    /// `parameters`/`context_parameter_field`, or a router emission with a
    /// non-template condition.
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// Anything else the kernel cannot classify more specifically.
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl SoeError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub fn backend(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Backend {
            operation: operation.into(),
            message: message.into(),
        }
    }
}

/// Convenience Result type alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, SoeError>;
