//! ABOUTME: Model-call node handler (spec.md §4.5)
//! ABOUTME: Renders one prompt, calls the model with retry, stores the result, selects emissions

use crate::contract::{parse_response, ResponseContract};
use crate::selection::{classify_emissions, select_emissions, semantic_signal_pairs};
use soe_core::{
    Context, ContextMutation, ConversationHistoryBackend, ConversationRole, ConversationTurn,
    FieldSchema, HandlerOutcome, IdentityMap, LlmNodeConfig, MainExecutionId, ModelCallConfig,
    ModelCaller, OperationalDelta, Result, SoeError,
};
use soe_template::{Evaluator, View};
use tracing::warn;

/// Collaborators an `llm` node needs beyond the context/evaluator every node
/// handler already takes. Grouped so the call site doesn't thread five
/// separate borrows through the dispatcher.
pub struct LlmDependencies<'a> {
    pub model: &'a dyn ModelCaller,
    pub identities: &'a IdentityMap,
    pub context_schema: &'a FieldSchema,
    pub history: Option<&'a dyn ConversationHistoryBackend>,
    pub main_execution_id: MainExecutionId,
}

pub async fn execute_llm(
    node: &soe_core::Node,
    config: &LlmNodeConfig,
    context: &Context,
    evaluator: &Evaluator,
    deps: &LlmDependencies<'_>,
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
    let augmented_prompt = contract.augment_prompt(&rendered_prompt);

    let use_history = config.identity.as_deref().is_some_and(|name| !name.is_empty());
    let system_prompt = config
        .identity
        .as_ref()
        .and_then(|name| deps.identities.get(name).cloned());

    let history_turns = if use_history {
        match deps.history {
            Some(backend) => backend.get(deps.main_execution_id).await?,
            None => Vec::new(),
        }
    } else {
        Vec::new()
    };

    let call_config = ModelCallConfig {
        system_prompt,
        history: history_turns,
        response_schema: None,
    };

    let total_attempts = 1 + config.retries;
    let mut llm_calls = 0u64;
    let mut last_error = String::new();
    let mut parsed = None;
    let mut raw_response = String::new();

    for attempt in 1..=total_attempts {
        llm_calls += 1;
        match deps.model.call(&augmented_prompt, &call_config).await {
            Ok(text) => match parse_response(&text, &contract) {
                Ok(p) => {
                    raw_response = text;
                    parsed = Some(p);
                    break;
                }
                Err(e) => {
                    last_error = e.to_string();
                    warn!(node = %node.name, attempt, total_attempts, error = %last_error, "unparseable model response");
                }
            },
            Err(e) => {
                last_error = e.to_string();
                warn!(node = %node.name, attempt, total_attempts, error = %last_error, "model call failed");
            }
        }
    }

    let Some(parsed) = parsed else {
        let mut outcome = HandlerOutcome::empty();
        outcome.operational_delta = OperationalDelta {
            llm_calls,
            tool_calls: 0,
            errors: 1,
        };
        return match &config.llm_failure_signal {
            Some(signal) => Ok(outcome.emit(signal.clone())),
            None => Err(SoeError::ModelCall {
                node: node.name.clone(),
                attempts: llm_calls as u32,
                message: last_error,
            }),
        };
    };

    if use_history {
        if let Some(backend) = deps.history {
            backend
                .append(
                    deps.main_execution_id,
                    ConversationTurn {
                        role: ConversationRole::User,
                        content: rendered_prompt,
                    },
                )
                .await?;
            backend
                .append(
                    deps.main_execution_id,
                    ConversationTurn {
                        role: ConversationRole::Assistant,
                        content: raw_response,
                    },
                )
                .await?;
        }
    }

    let mut outcome = HandlerOutcome::empty();
    outcome.operational_delta = OperationalDelta {
        llm_calls,
        tool_calls: 0,
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

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use soe_core::{Emission, NodeKind};

    struct StaticModel(String);
    #[async_trait]
    impl ModelCaller for StaticModel {
        async fn call(&self, _prompt: &str, _config: &ModelCallConfig) -> Result<String> {
            Ok(self.0.clone())
        }
    }

    struct AlwaysFailsModel;
    #[async_trait]
    impl ModelCaller for AlwaysFailsModel {
        async fn call(&self, _prompt: &str, _config: &ModelCallConfig) -> Result<String> {
            Err(SoeError::internal("no model configured"))
        }
    }

    fn llm_node(emissions: Vec<Emission>, cfg: LlmNodeConfig) -> soe_core::Node {
        soe_core::Node {
            name: "ask".to_string(),
            event_triggers: vec!["START".to_string()],
            event_emissions: emissions,
            kind: NodeKind::Llm(cfg),
        }
    }

    fn deps<'a>(model: &'a dyn ModelCaller, identities: &'a IdentityMap, schema: &'a FieldSchema) -> LlmDependencies<'a> {
        LlmDependencies {
            model,
            identities,
            context_schema: schema,
            history: None,
            main_execution_id: MainExecutionId::new(),
        }
    }

    #[tokio::test]
    async fn plain_response_writes_output_field() {
        let model = StaticModel("hello world".to_string());
        let identities = IdentityMap::new();
        let schema = FieldSchema::new();
        let cfg = LlmNodeConfig {
            prompt: "say hi".to_string(),
            identity: None,
            output_field: Some("greeting".to_string()),
            retries: 3,
            llm_failure_signal: None,
        };
        let node = llm_node(vec![], cfg.clone());
        let outcome = execute_llm(&node, &cfg, &Context::new(), &Evaluator::new(), &deps(&model, &identities, &schema))
            .await
            .unwrap();
        assert_eq!(outcome.mutations[0].value, soe_core::Value::String("hello world".to_string()));
        assert_eq!(outcome.operational_delta.llm_calls, 1);
    }

    #[tokio::test]
    async fn exhausted_retries_without_failure_signal_is_fatal() {
        let model = AlwaysFailsModel;
        let identities = IdentityMap::new();
        let schema = FieldSchema::new();
        let cfg = LlmNodeConfig {
            prompt: "say hi".to_string(),
            identity: None,
            output_field: None,
            retries: 1,
            llm_failure_signal: None,
        };
        let node = llm_node(vec![], cfg.clone());
        let err = execute_llm(&node, &cfg, &Context::new(), &Evaluator::new(), &deps(&model, &identities, &schema))
            .await
            .unwrap_err();
        assert!(matches!(err, SoeError::ModelCall { .. }));
    }

    #[tokio::test]
    async fn exhausted_retries_with_failure_signal_emits_it() {
        let model = AlwaysFailsModel;
        let identities = IdentityMap::new();
        let schema = FieldSchema::new();
        let cfg = LlmNodeConfig {
            prompt: "say hi".to_string(),
            identity: None,
            output_field: None,
            retries: 0,
            llm_failure_signal: Some("LLM_FAILED".to_string()),
        };
        let node = llm_node(vec![], cfg.clone());
        let outcome = execute_llm(&node, &cfg, &Context::new(), &Evaluator::new(), &deps(&model, &identities, &schema))
            .await
            .unwrap();
        assert_eq!(outcome.emitted_signals, vec!["LLM_FAILED"]);
        assert_eq!(outcome.operational_delta.errors, 1);
    }

    #[tokio::test]
    async fn semantic_emissions_come_from_model_selected_signals() {
        let model = StaticModel(
            r#"{"response": "ok", "selected_signals": ["HAPPY"]}"#.to_string(),
        );
        let identities = IdentityMap::new();
        let schema = FieldSchema::new();
        let cfg = LlmNodeConfig {
            prompt: "how does the customer feel".to_string(),
            identity: None,
            output_field: Some("mood".to_string()),
            retries: 1,
            llm_failure_signal: None,
        };
        let node = llm_node(
            vec![
                Emission {
                    signal_name: "HAPPY".to_string(),
                    condition: Some("customer is happy".to_string()),
                },
                Emission {
                    signal_name: "SAD".to_string(),
                    condition: Some("customer is upset".to_string()),
                },
            ],
            cfg.clone(),
        );
        let outcome = execute_llm(&node, &cfg, &Context::new(), &Evaluator::new(), &deps(&model, &identities, &schema))
            .await
            .unwrap();
        assert_eq!(outcome.emitted_signals, vec!["HAPPY"]);
    }
}
