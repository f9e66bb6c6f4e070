//! ABOUTME: Tool node handler (spec.md §4.6)
//! ABOUTME: Renders arguments, calls the tool registry with retry, evaluates emissions against {result, context}

use soe_core::{
    Context, ContextMutation, HandlerOutcome, OperationalDelta, Result, SoeError, ToolNodeConfig,
    ToolRegistry, Value,
};
use soe_template::{Evaluator, View};
use tracing::warn;

/// Execute a `tool` node, returning its outcome or a fatal [`SoeError`] when
/// no `failure_signal` absorbs the exhausted-retries case.
pub async fn execute_tool(
    node: &soe_core::Node,
    config: &ToolNodeConfig,
    context: &Context,
    evaluator: &Evaluator,
    registry: &dyn ToolRegistry,
) -> Result<HandlerOutcome> {
    let entry = registry.get(&config.tool_name).ok_or_else(|| {
        SoeError::ToolExecution {
            tool: config.tool_name.clone(),
            attempts: 0,
            message: "tool is not registered".to_string(),
        }
    })?;

    let args = build_arguments(config, context, entry.process_accumulated)?;

    let total_attempts = 1 + entry.max_retries;
    let mut last_error = String::new();
    let mut tool_calls = 0u64;
    let mut result = None;

    for attempt in 1..=total_attempts {
        tool_calls += 1;
        match entry.function.call(args.clone()).await {
            Ok(value) => {
                result = Some(value);
                break;
            }
            Err(e) => {
                last_error = e.to_string();
                warn!(
                    node = %node.name,
                    tool = %config.tool_name,
                    attempt,
                    total_attempts,
                    error = %last_error,
                    "tool call failed"
                );
            }
        }
    }

    let Some(result) = result else {
        let mut outcome = HandlerOutcome::empty();
        outcome.operational_delta = OperationalDelta {
            llm_calls: 0,
            tool_calls,
            errors: 1,
        };
        return match &entry.failure_signal {
            Some(signal) => Ok(outcome.emit(signal.clone())),
            None => Err(SoeError::ToolExecution {
                tool: config.tool_name.clone(),
                attempts: tool_calls as u32,
                message: last_error,
            }),
        };
    };

    let mut outcome = HandlerOutcome::empty();
    outcome.operational_delta = OperationalDelta {
        llm_calls: 0,
        tool_calls,
        errors: 0,
    };

    if let Some(output_field) = &config.output_field {
        outcome
            .mutations
            .push(ContextMutation::new(output_field.clone(), result.clone()));
    }

    let view = View::new(context.clone()).with_result(result);
    for emission in &node.event_emissions {
        let should_emit = match &emission.condition {
            None => true,
            Some(condition) => evaluator.truthy_evaluate(condition, &view)?,
        };
        if should_emit {
            outcome.emitted_signals.push(emission.signal_name.clone());
        }
    }

    Ok(outcome)
}

fn build_arguments(
    config: &ToolNodeConfig,
    context: &Context,
    process_accumulated: bool,
) -> Result<Value> {
    if let Some(parameters) = &config.parameters {
        let evaluator = Evaluator::new();
        let view = View::new(context.clone());
        let mut object = serde_json::Map::with_capacity(parameters.len());
        for (key, template) in parameters {
            let rendered = evaluator.render(template, &view)?;
            object.insert(key.clone(), Value::String(rendered));
        }
        return Ok(Value::Object(object));
    }

    if let Some(field) = &config.context_parameter_field {
        if process_accumulated {
            return Ok(Value::Array(context.accumulated(field).to_vec()));
        }
        let value = context.current(field).cloned().ok_or_else(|| {
            SoeError::configuration(format!(
                "context_parameter_field '{field}' has no value yet"
            ))
        })?;
        return Ok(value);
    }

    Ok(Value::Null)
}
