//! ABOUTME: Layers the engine's built-in tools (spec.md §4.10) on top of an embedder-supplied registry
//! ABOUTME: Built-ins are checked first so a workflow cannot shadow `soe_*` names with its own tools

use parking_lot::RwLock;
use soe_core::{StaticToolRegistry, ToolEntry, ToolRegistry};
use soe_nodes::{register_builtin_tools, BuiltinToolState};
use std::sync::{Arc, Weak};

/// A two-tier [`ToolRegistry`]: the nineteen `soe_*` built-ins, checked
/// first, falling back to whatever tools the embedder registered. The
/// built-ins are installed after construction via [`LayeredToolRegistry::install_builtins`]
/// so their own `soe_call_tool`/`soe_get_available_tools` can hold a `Weak`
/// reference back to this registry without creating a reference cycle.
pub struct LayeredToolRegistry {
    builtins: RwLock<StaticToolRegistry>,
    fallback: Arc<dyn ToolRegistry>,
}

impl LayeredToolRegistry {
    #[must_use]
    pub fn new(fallback: Arc<dyn ToolRegistry>) -> Arc<Self> {
        Arc::new(Self {
            builtins: RwLock::new(StaticToolRegistry::new()),
            fallback,
        })
    }

    /// Build and install the built-in tools, given everything except the
    /// self-referencing `tools` handle, which this method supplies.
    pub fn install_builtins(self: &Arc<Self>, state_without_tools: impl FnOnce(Weak<dyn ToolRegistry>) -> BuiltinToolState) {
        let weak_self: Weak<dyn ToolRegistry> = Arc::downgrade(self);
        let state = state_without_tools(weak_self);
        let mut builtins = StaticToolRegistry::new();
        register_builtin_tools(&mut builtins, state);
        *self.builtins.write() = builtins;
    }
}

impl ToolRegistry for LayeredToolRegistry {
    fn get(&self, name: &str) -> Option<ToolEntry> {
        self.builtins
            .read()
            .get(name)
            .or_else(|| self.fallback.get(name))
    }

    fn names(&self) -> Vec<String> {
        let mut names = self.builtins.read().names();
        names.extend(self.fallback.names());
        names
    }
}
