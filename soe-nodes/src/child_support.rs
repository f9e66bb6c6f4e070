//! ABOUTME: Pure helpers for the child-node fan-out and seed-context projection (spec.md §4.8)
//! ABOUTME: Recursive orchestration and parent-queue wiring live in soe-dispatch, which owns the recursion

use soe_core::{Context, Value};

/// Seed a child's initial context with copies of the parent's *current*
/// values for each `input_fields` entry (spec.md §4.8 step 2: "copy current
/// values only").
#[must_use]
pub fn project_child_seed_context(parent_context: &Context, input_fields: &[String]) -> Context {
    let mut seeded = Context::new();
    for field in input_fields {
        if let Some(value) = parent_context.current(field) {
            seeded.append(field, value.clone());
        }
    }
    seeded
}

/// Snapshot the fan-out field's accumulated history at spawn time; one
/// child is spawned per returned element (spec.md §4.8 "Fan-out path").
#[must_use]
pub fn fan_out_elements(parent_context: &Context, fan_out_field: &str) -> Vec<Value> {
    parent_context.accumulated(fan_out_field).to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn seed_context_copies_only_current_values() {
        let mut parent = Context::new();
        parent.append("topic", json!("rust"));
        parent.append("topic", json!("orchestration"));
        parent.append("ignored", json!("nope"));

        let seeded = project_child_seed_context(&parent, &["topic".to_string()]);
        assert_eq!(seeded.accumulated("topic"), &[json!("orchestration")]);
        assert!(!seeded.contains("ignored"));
    }

    #[test]
    fn missing_input_field_is_skipped_not_an_error() {
        let parent = Context::new();
        let seeded = project_child_seed_context(&parent, &["absent".to_string()]);
        assert!(!seeded.contains("absent"));
    }

    #[test]
    fn fan_out_snapshots_full_history_at_spawn_time() {
        let mut parent = Context::new();
        parent.append("items", json!("a"));
        parent.append("items", json!("b"));
        assert_eq!(
            fan_out_elements(&parent, "items"),
            vec![json!("a"), json!("b")]
        );
    }
}
