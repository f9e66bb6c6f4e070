//! ABOUTME: Tool-registry collaborator trait (spec.md §6.2)
//! ABOUTME: A mapping from tool name to a callable, or to a callable plus retry/failure config

use crate::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// A single tool function. Tool bodies are out of scope for the kernel
/// (spec.md §1); this is the seam the kernel calls through.
#[async_trait]
pub trait ToolFn: Send + Sync {
    async fn call(&self, args: Value) -> Result<Value>;
}

#[async_trait]
impl<F, Fut> ToolFn for F
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Result<Value>> + Send,
{
    async fn call(&self, args: Value) -> Result<Value> {
        (self)(args).await
    }
}

/// Per-tool registry-configured execution policy (spec.md §4.6 step 1, §6.2).
#[derive(Debug, Clone)]
pub struct ToolEntry {
    pub function: Arc<dyn ToolFn>,
    /// Additional attempts allowed beyond the first call; total attempts is
    /// `1 + max_retries`. Defaults to 1 per §4.6.
    pub max_retries: u32,
    pub failure_signal: Option<String>,
    pub process_accumulated: bool,
}

impl ToolEntry {
    #[must_use]
    pub fn new(function: Arc<dyn ToolFn>) -> Self {
        Self {
            function,
            max_retries: 1,
            failure_signal: None,
            process_accumulated: false,
        }
    }

    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    #[must_use]
    pub fn with_failure_signal(mut self, signal: impl Into<String>) -> Self {
        self.failure_signal = Some(signal.into());
        self
    }

    #[must_use]
    pub fn with_process_accumulated(mut self, process_accumulated: bool) -> Self {
        self.process_accumulated = process_accumulated;
        self
    }
}

/// The tool registry consumed by tool and agent nodes. Implementations
/// typically also register the engine-provided built-ins of spec.md §4.10.
pub trait ToolRegistry: Send + Sync {
    fn get(&self, name: &str) -> Option<ToolEntry>;
    fn names(&self) -> Vec<String>;
}

/// A simple in-memory tool registry, sufficient for embedders that don't
/// need dynamic tool discovery.
#[derive(Default, Clone)]
pub struct StaticToolRegistry {
    tools: HashMap<String, ToolEntry>,
}

impl StaticToolRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, entry: ToolEntry) -> &mut Self {
        self.tools.insert(name.into(), entry);
        self
    }
}

impl ToolRegistry for StaticToolRegistry {
    fn get(&self, name: &str) -> Option<ToolEntry> {
        self.tools.get(name).cloned()
    }

    fn names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }
}
