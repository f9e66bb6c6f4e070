//! ABOUTME: Agent node handler: a bounded multi-turn model + tools loop (spec.md §4.7)
//! ABOUTME: Tool failures without a registry failure_signal count against the node's own retries budget

use crate::contract::{augment_agent_prompt, parse_agent_turn, AgentTurn, ResponseContract};
use crate::selection::{classify_emissions, select_emissions, semantic_signal_pairs};
use soe_core::{
    AgentNodeConfig, Context, ContextMutation, ConversationHistoryBackend, ConversationRole,
    ConversationTurn, FieldSchema, HandlerOutcome, IdentityMap, MainExecutionId, ModelCallConfig,
    ModelCaller, OperationalDelta, Result, SoeError, ToolRegistry,
};
use soe_template::{Evaluator, View};
use tracing::warn;

pub struct AgentDependencies<'a> {
    pub model: &'a dyn ModelCaller,
    pub identities: &'a IdentityMap,
    pub context_schema: &'a FieldSchema,
    pub history: Option<&'a dyn ConversationHistoryBackend>,
    pub tools: &'a dyn ToolRegistry,
    pub main_execution_id: MainExecutionId,
}

pub async fn execute_agent(
    node: &soe_core::Node,
    config: &AgentNodeConfig,
    context: &Context,
    evaluator: &Evaluator,
    deps: &AgentDependencies<'_>,
) -> Result<HandlerOutcome> {
    let view = View::new(context.clone());
    let rendered_prompt = evaluator.render(&config.prompt, &view)?;

    let mode = classify_emissions(&node.event_emissions);
    let output_schema = config
        .output_field
        .as_ref()
        .and_then(|f| deps.context_schema.get(f).cloned());
    let semantic_signals = if mode == crate::selection::EmissionMode::Semantic {
        semantic_signal_pairs(&node.event_emissions)
    } else {
        Vec::new()
    };
    let contract = ResponseContract {
        output_schema,
        semantic_signals,
    };

    let use_history = config.identity.as_deref().is_some_and(|name| !name.is_empty());
    let system_prompt = config
        .identity
        .as_ref()
        .and_then(|name| deps.identities.get(name).cloned());

    let mut local_turns = if use_history {
        match deps.history {
            Some(backend) => backend.get(deps.main_execution_id).await?,
            None => Vec::new(),
        }
    } else {
        Vec::new()
    };
    let turns_before = local_turns.len();

    local_turns.push(ConversationTurn {
        role: ConversationRole::User,
        content: rendered_prompt.clone(),
    });

    let mut llm_calls = 0u64;
    let mut tool_calls = 0u64;
    let mut failed_attempts = 0u32;
    let mut turn_number = 0usize;
    let prompt = augment_agent_prompt(&rendered_prompt, &config.tools, &contract);

    let final_parsed = loop {
        if let Some(cap) = config.max_tool_turns {
            if turn_number >= cap {
                break None;
            }
        }
        turn_number += 1;

        let call_config = ModelCallConfig {
            system_prompt: system_prompt.clone(),
            history: local_turns.clone(),
            response_schema: None,
        };

        llm_calls += 1;
        let turn = match deps.model.call(&prompt, &call_config).await {
            Ok(text) => parse_agent_turn(&text, &contract).map(|t| (text, t)),
            Err(e) => Err(e),
        };

        match turn {
            Ok((raw_text, AgentTurn::Final(parsed))) => {
                local_turns.push(ConversationTurn {
                    role: ConversationRole::Assistant,
                    content: raw_text,
                });
                break Some(parsed);
            }
            Ok((raw_text, AgentTurn::ToolCall { name, arguments })) => {
                local_turns.push(ConversationTurn {
                    role: ConversationRole::Assistant,
                    content: raw_text,
                });

                let Some(entry) = deps.tools.get(&name) else {
                    failed_attempts += 1;
                    warn!(node = %node.name, tool = %name, "agent selected an unregistered tool");
                    if failed_attempts > config.retries {
                        break None;
                    }
                    local_turns.push(ConversationTurn {
                        role: ConversationRole::User,
                        content: format!("Tool '{name}' is not registered."),
                    });
                    continue;
                };

                let total_tool_attempts = 1 + entry.max_retries;
                let mut tool_result = None;
                let mut tool_error = String::new();
                for attempt in 1..=total_tool_attempts {
                    tool_calls += 1;
                    match entry.function.call(arguments.clone()).await {
                        Ok(v) => {
                            tool_result = Some(v);
                            break;
                        }
                        Err(e) => {
                            tool_error = e.to_string();
                            warn!(node = %node.name, tool = %name, attempt, total_tool_attempts, error = %tool_error, "agent tool call failed");
                        }
                    }
                }

                match tool_result {
                    Some(value) => {
                        local_turns.push(ConversationTurn {
                            role: ConversationRole::User,
                            content: format!("Tool '{name}' result: {value}"),
                        });
                    }
                    None => match &entry.failure_signal {
                        Some(signal) => {
                            local_turns.push(ConversationTurn {
                                role: ConversationRole::User,
                                content: format!(
                                    "Tool '{name}' failed after {total_tool_attempts} attempt(s); failure signal '{signal}' recorded."
                                ),
                            });
                        }
                        None => {
                            failed_attempts += 1;
                            if failed_attempts > config.retries {
                                break None;
                            }
                            local_turns.push(ConversationTurn {
                                role: ConversationRole::User,
                                content: format!(
                                    "Tool '{name}' failed after {total_tool_attempts} attempt(s): {tool_error}"
                                ),
                            });
                        }
                    },
                }
                continue;
            }
            Err(e) => {
                failed_attempts += 1;
                warn!(node = %node.name, attempt = failed_attempts, error = %e, "agent turn produced unparseable output");
                if failed_attempts > config.retries {
                    break None;
                }
                continue;
            }
        }
    };

    let Some(parsed) = final_parsed else {
        let mut outcome = HandlerOutcome::empty();
        outcome.operational_delta = OperationalDelta {
            llm_calls,
            tool_calls,
            errors: 1,
        };
        return match &config.llm_failure_signal {
            Some(signal) => Ok(outcome.emit(signal.clone())),
            None => Err(SoeError::ModelCall {
                node: node.name.clone(),
                attempts: llm_calls as u32,
                message: "agent exhausted its retries budget".to_string(),
            }),
        };
    };

    if use_history {
        if let Some(backend) = deps.history {
            for turn in local_turns.into_iter().skip(turns_before) {
                backend.append(deps.main_execution_id, turn).await?;
            }
        }
    }

    let mut outcome = HandlerOutcome::empty();
    outcome.operational_delta = OperationalDelta {
        llm_calls,
        tool_calls,
        errors: 0,
    };
    if let Some(output_field) = &config.output_field {
        outcome
            .mutations
            .push(ContextMutation::new(output_field.clone(), parsed.primary));
    }
    outcome.emitted_signals = select_emissions(
        &node.event_emissions,
        mode,
        &view,
        evaluator,
        &parsed.selected_signals,
    )?;

    Ok(outcome)
}
