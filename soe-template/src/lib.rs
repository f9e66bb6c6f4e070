//! ABOUTME: Template rendering and condition evaluation for the SOE kernel
//! ABOUTME: render()/truthy_evaluate() plus the `accumulated`/`length` operations of spec.md §4.1

use soe_core::{Context, Result, SoeError, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tera::Tera;

/// Whether a condition string is evaluated programmatically or is a
/// semantic description meant for model-based signal selection
/// (spec.md §4.1, §6.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionKind {
    Template,
    Semantic,
}

/// A condition containing `{{`/`{%` is template-style; any other non-empty
/// string is a semantic description. An absent condition has no `ConditionKind`.
#[must_use]
pub fn classify_condition(condition: &str) -> ConditionKind {
    if condition.contains("{{") || condition.contains("{%") {
        ConditionKind::Template
    } else {
        ConditionKind::Semantic
    }
}

/// Read-only view handed to the evaluator: `context` (current field values)
/// plus an optional `result` (tool nodes only, spec.md §4.6).
#[derive(Debug, Clone)]
pub struct View {
    context: Context,
    result: Option<Value>,
}

impl View {
    #[must_use]
    pub fn new(context: Context) -> Self {
        Self {
            context,
            result: None,
        }
    }

    #[must_use]
    pub fn with_result(mut self, result: Value) -> Self {
        self.result = Some(result);
        self
    }
}

/// Renders templates and evaluates conditions against a [`View`].
///
/// Built fresh per call: template/condition evaluation is not on the kernel's
/// hot path (node handlers are themselves bound by model/tool latency), so a
/// long-lived cached `Tera` instance buys nothing here.
pub struct Evaluator;

impl Evaluator {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn build_tera(view: &View) -> (Tera, tera::Context) {
        let mut tera = Tera::default();
        let history = Arc::new(view.context.clone());
        tera.register_function("accumulated", accumulated_fn(history));

        let mut ctx = tera::Context::new();
        ctx.insert("context", &view.context.to_current_value_map());
        if let Some(result) = &view.result {
            ctx.insert("result", result);
        }
        (tera, ctx)
    }

    /// Render a text template (prompts, tool parameters, ...) against `view`.
    /// Missing fields render as the literal string `"undefined"` rather than
    /// raising (spec.md §4.1).
    pub fn render(&self, template: &str, view: &View) -> Result<String> {
        let (mut tera, ctx) = Self::build_tera(view);
        match tera.render_str(template, &ctx) {
            Ok(rendered) => Ok(rendered),
            Err(e) if is_undefined_variable_error(&e) => Ok("undefined".to_string()),
            Err(e) => Err(SoeError::Evaluator {
                node: String::new(),
                message: e.to_string(),
            }),
        }
    }

    /// Evaluate a condition's truthiness against `view`. Conditions are
    /// written wrapped in template delimiters (e.g. `{{ context.data is
    /// defined }}`); the wrapper is stripped and the inner expression is
    /// evaluated as a Tera boolean test so truthiness follows Tera's own
    /// rules (matching spec.md §9's tagged-variant truthiness).
    pub fn truthy_evaluate(&self, condition: &str, view: &View) -> Result<bool> {
        let expr = strip_delimiters(condition);
        let wrapped = format!("{{%- if {expr} -%}}true{{%- else -%}}false{{%- endif -%}}");
        let (mut tera, ctx) = Self::build_tera(view);
        match tera.render_str(&wrapped, &ctx) {
            Ok(rendered) => Ok(rendered.trim() == "true"),
            Err(e) if is_undefined_variable_error(&e) => Ok(false),
            Err(e) => Err(SoeError::Evaluator {
                node: String::new(),
                message: e.to_string(),
            }),
        }
    }
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new()
    }
}

/// Strips a single layer of `{{ }}` / `{% %}` delimiters and surrounding
/// whitespace, if present, leaving a bare boolean expression.
fn strip_delimiters(condition: &str) -> String {
    let trimmed = condition.trim();
    let stripped = trimmed
        .strip_prefix("{{")
        .and_then(|s| s.strip_suffix("}}"))
        .or_else(|| {
            trimmed
                .strip_prefix("{%")
                .and_then(|s| s.strip_suffix("%}"))
        });
    stripped.unwrap_or(trimmed).trim().to_string()
}

fn is_undefined_variable_error(err: &tera::Error) -> bool {
    let mut cur: Option<&dyn std::error::Error> = Some(err);
    while let Some(e) = cur {
        if e.to_string().contains("not found in context") {
            return true;
        }
        cur = e.source();
    }
    false
}

/// Implements the `accumulated` operation of spec.md §4.1/§4.2:
/// `accumulated(field="x")` returns the full history list for context field
/// `x`, independent of the (current-value-only) `context` view exposed for
/// ordinary rendering. Compose with Tera's builtin `length` filter, e.g.
/// `{{ accumulated(field="items") | length }}` (spec.md §8 scenario 4).
fn accumulated_fn(
    history: Arc<Context>,
) -> impl Fn(&HashMap<String, Value>) -> tera::Result<Value> + Sync + Send {
    move |args: &HashMap<String, Value>| -> tera::Result<Value> {
        let field = args
            .get("field")
            .and_then(Value::as_str)
            .ok_or_else(|| tera::Error::msg("accumulated() requires a `field` argument"))?;
        Ok(Value::Array(history.accumulated(field).to_vec()))
    }
}
