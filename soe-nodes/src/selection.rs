//! ABOUTME: Shared emission-selection logic for llm and agent nodes (spec.md §4.5 step 5, §4.7 step 4)
//! ABOUTME: Template conditions pre-empt semantic (model-driven) selection; 0-or-1 emissions are unconditional

use soe_core::{Emission, Result};
use soe_template::{classify_condition, ConditionKind, Evaluator, View};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmissionMode {
    /// At least one declared emission has a template condition: every
    /// emission is evaluated programmatically (plain-text ones are always
    /// false in this mode).
    Template,
    /// More than one emission declared, all conditions plain-text or
    /// absent: the model picks which signals to emit via `selected_signals`.
    Semantic,
    /// Zero or one emission declared: fire it unconditionally (or nothing).
    Unconditional,
}

#[must_use]
pub fn classify_emissions(emissions: &[Emission]) -> EmissionMode {
    let any_template = emissions.iter().any(|e| {
        e.condition
            .as_deref()
            .is_some_and(|c| classify_condition(c) == ConditionKind::Template)
    });
    if any_template {
        return EmissionMode::Template;
    }
    if emissions.len() > 1 {
        return EmissionMode::Semantic;
    }
    EmissionMode::Unconditional
}

/// The `(signal_name, description)` pairs a semantic contract extends the
/// model prompt with (spec.md §4.5 step 2).
#[must_use]
pub fn semantic_signal_pairs(emissions: &[Emission]) -> Vec<(String, String)> {
    emissions
        .iter()
        .map(|e| {
            (
                e.signal_name.clone(),
                e.condition.clone().unwrap_or_default(),
            )
        })
        .collect()
}

/// Resolve which signals actually fire, given the node's declared emissions,
/// its [`EmissionMode`], and (for `Semantic` mode) the model's returned
/// `selected_signals`.
pub fn select_emissions(
    emissions: &[Emission],
    mode: EmissionMode,
    view: &View,
    evaluator: &Evaluator,
    model_selected: &[String],
) -> Result<Vec<String>> {
    match mode {
        EmissionMode::Unconditional => Ok(emissions
            .first()
            .map(|e| vec![e.signal_name.clone()])
            .unwrap_or_default()),
        EmissionMode::Template => {
            let mut selected = Vec::new();
            for emission in emissions {
                let fires = match &emission.condition {
                    None => true,
                    Some(condition) => match classify_condition(condition) {
                        ConditionKind::Template => evaluator.truthy_evaluate(condition, view)?,
                        ConditionKind::Semantic => false,
                    },
                };
                if fires {
                    selected.push(emission.signal_name.clone());
                }
            }
            Ok(selected)
        }
        EmissionMode::Semantic => {
            let declared: std::collections::HashSet<&str> =
                emissions.iter().map(|e| e.signal_name.as_str()).collect();
            Ok(model_selected
                .iter()
                .filter(|s| declared.contains(s.as_str()))
                .cloned()
                .collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn emission(name: &str, condition: Option<&str>) -> Emission {
        Emission {
            signal_name: name.to_string(),
            condition: condition.map(str::to_string),
        }
    }

    #[test]
    fn zero_or_one_emission_is_unconditional() {
        assert_eq!(classify_emissions(&[]), EmissionMode::Unconditional);
        assert_eq!(
            classify_emissions(&[emission("A", None)]),
            EmissionMode::Unconditional
        );
    }

    #[test]
    fn multiple_plain_text_emissions_are_semantic() {
        let emissions = vec![
            emission("HAPPY", Some("customer is happy")),
            emission("SAD", Some("customer is upset")),
        ];
        assert_eq!(classify_emissions(&emissions), EmissionMode::Semantic);
    }

    #[test]
    fn any_template_condition_forces_template_mode() {
        let emissions = vec![
            emission("HAPPY", Some("customer is happy")),
            emission("HAS", Some("{{ context.data is defined }}")),
        ];
        assert_eq!(classify_emissions(&emissions), EmissionMode::Template);
    }

    #[test]
    fn semantic_selection_filters_to_declared_signals() {
        let emissions = vec![emission("A", Some("desc a")), emission("B", Some("desc b"))];
        let view = View::new(soe_core::Context::new());
        let evaluator = Evaluator::new();
        let selected = select_emissions(
            &emissions,
            EmissionMode::Semantic,
            &view,
            &evaluator,
            &["A".to_string(), "UNKNOWN".to_string()],
        )
        .unwrap();
        assert_eq!(selected, vec!["A".to_string()]);
    }
}
