//! ABOUTME: Router node handler: pure control flow, never touches external services or context
//! ABOUTME: Spec.md §4.4

use soe_core::{Context, HandlerOutcome, Result, RouterNodeConfig};
use soe_template::{classify_condition, ConditionKind, Evaluator, View};

/// Evaluate a router's emissions against the current context.
///
/// - No condition: emit unconditionally.
/// - Template condition: emit iff truthy.
/// - Plain-text condition: rejected at load time (spec.md §9), so none
///   should reach here; treated as a no-op rather than panicking, in case a
///   registry was mutated in-flight via the injection API around validation.
pub fn execute_router(
    node: &soe_core::Node,
    _config: &RouterNodeConfig,
    context: &Context,
    evaluator: &Evaluator,
) -> Result<HandlerOutcome> {
    let view = View::new(context.clone());
    let mut outcome = HandlerOutcome::empty();

    for emission in &node.event_emissions {
        let should_emit = match &emission.condition {
            None => true,
            Some(condition) => match classify_condition(condition) {
                ConditionKind::Template => evaluator.truthy_evaluate(condition, &view)?,
                ConditionKind::Semantic => false,
            },
        };
        if should_emit {
            outcome = outcome.emit(emission.signal_name.clone());
        }
    }

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use soe_core::{Emission, NodeKind};

    fn router_node(emissions: Vec<Emission>) -> soe_core::Node {
        soe_core::Node {
            name: "gate".to_string(),
            event_triggers: vec!["START".to_string()],
            event_emissions: emissions,
            kind: NodeKind::Router(RouterNodeConfig::default()),
        }
    }

    #[test]
    fn unconditional_emission_always_fires() {
        let node = router_node(vec![Emission {
            signal_name: "ALWAYS".to_string(),
            condition: None,
        }]);
        let outcome =
            execute_router(&node, &RouterNodeConfig::default(), &Context::new(), &Evaluator::new())
                .unwrap();
        assert_eq!(outcome.emitted_signals, vec!["ALWAYS"]);
        assert!(outcome.mutations.is_empty());
    }

    #[test]
    fn template_condition_gates_emission() {
        let node = router_node(vec![
            Emission {
                signal_name: "HAS".to_string(),
                condition: Some("{{ context.data is defined }}".to_string()),
            },
            Emission {
                signal_name: "MISSING".to_string(),
                condition: Some("{{ context.data is not defined }}".to_string()),
            },
        ]);
        let mut ctx = Context::new();
        ctx.append("data", json!(1));
        let outcome =
            execute_router(&node, &RouterNodeConfig::default(), &ctx, &Evaluator::new()).unwrap();
        assert_eq!(outcome.emitted_signals, vec!["HAS"]);
    }

    #[test]
    fn semantic_condition_never_fires() {
        let node = router_node(vec![Emission {
            signal_name: "NEVER".to_string(),
            condition: Some("the customer seems happy".to_string()),
        }]);
        let outcome =
            execute_router(&node, &RouterNodeConfig::default(), &Context::new(), &Evaluator::new())
                .unwrap();
        assert!(outcome.emitted_signals.is_empty());
    }
}
