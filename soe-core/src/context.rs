//! ABOUTME: The raw per-execution context data model (spec.md §3.2)
//! ABOUTME: A plain history-list map; `soe-context` builds the store API on top of this

use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Mapping from field name to its full history of written values. The last
/// element is the field's current value. Fields are created on first write.
/// This is the data the context backend (spec.md §6.1) persists whole.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Context(HashMap<String, Vec<Value>>);

impl Context {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn accumulated(&self, field: &str) -> &[Value] {
        self.0.get(field).map_or(&[], Vec::as_slice)
    }

    #[must_use]
    pub fn current(&self, field: &str) -> Option<&Value> {
        self.0.get(field).and_then(|h| h.last())
    }

    /// Append `value` to `field`'s history, creating it on first write.
    pub fn append(&mut self, field: &str, value: Value) {
        self.0.entry(field.to_string()).or_default().push(value);
    }

    #[must_use]
    pub fn fields(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    #[must_use]
    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    /// Render every current value into a flat JSON object, as consumed by
    /// the template evaluator's `context` view (spec.md §4.1).
    #[must_use]
    pub fn to_current_value_map(&self) -> serde_json::Map<String, Value> {
        self.0
            .iter()
            .filter_map(|(k, h)| h.last().map(|v| (k.clone(), v.clone())))
            .collect()
    }

    #[must_use]
    pub fn raw(&self) -> &HashMap<String, Vec<Value>> {
        &self.0
    }

    pub fn raw_mut(&mut self) -> &mut HashMap<String, Vec<Value>> {
        &mut self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn append_creates_history_on_first_write() {
        let mut ctx = Context::new();
        assert!(!ctx.contains("data"));
        ctx.append("data", json!(1));
        assert_eq!(ctx.accumulated("data"), &[json!(1)]);
        assert_eq!(ctx.current("data"), Some(&json!(1)));
    }

    #[test]
    fn every_write_appends_never_truncates() {
        let mut ctx = Context::new();
        ctx.append("data", json!(1));
        ctx.append("data", json!(2));
        ctx.append("data", json!(3));
        assert_eq!(ctx.accumulated("data").len(), 3);
        assert_eq!(ctx.current("data"), Some(&json!(3)));
    }

    #[test]
    fn missing_field_accumulated_is_empty() {
        let ctx = Context::new();
        assert!(ctx.accumulated("nope").is_empty());
        assert_eq!(ctx.current("nope"), None);
    }
}
