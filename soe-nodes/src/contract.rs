//! ABOUTME: Structured-output contract construction and parsing for model-call nodes
//! ABOUTME: The model caller returns raw text (spec.md §6.3); the kernel owns the JSON contract around it

use soe_core::{FieldSchemaEntry, Result, SoeError, Value};

/// What shape the model is asked to respond in (spec.md §4.5 step 2).
#[derive(Debug, Clone, Default)]
pub struct ResponseContract {
    pub output_schema: Option<FieldSchemaEntry>,
    /// `(signal_name, condition_description)` pairs for semantic selection.
    pub semantic_signals: Vec<(String, String)>,
}

impl ResponseContract {
    #[must_use]
    pub fn is_plain(&self) -> bool {
        self.output_schema.is_none() && self.semantic_signals.is_empty()
    }

    /// Appends instructions describing the expected JSON envelope. Plain
    /// contracts leave the prompt untouched: a node with no schema and no
    /// semantic emissions expects free-form text (spec.md §4.5 step 2 only
    /// mandates a contract "if" those conditions hold).
    #[must_use]
    pub fn augment_prompt(&self, rendered_prompt: &str) -> String {
        if self.is_plain() {
            return rendered_prompt.to_string();
        }

        let mut instructions = String::from(
            "\n\nRespond with a single JSON object and nothing else, matching this shape:\n",
        );
        instructions.push_str("{\n  \"response\": ");
        instructions.push_str(&match &self.output_schema {
            Some(schema) => describe_schema(schema),
            None => "a string".to_string(),
        });
        if !self.semantic_signals.is_empty() {
            instructions.push_str(",\n  \"selected_signals\": [");
            instructions.push_str(
                &self
                    .semantic_signals
                    .iter()
                    .map(|(name, desc)| format!("\"{name}\" // emit when: {desc}"))
                    .collect::<Vec<_>>()
                    .join(", "),
            );
            instructions.push_str("] // zero or more of the listed signal names");
        }
        instructions.push_str("\n}");
        format!("{rendered_prompt}{instructions}")
    }
}

fn describe_schema(schema: &FieldSchemaEntry) -> String {
    let type_name = match schema.field_type {
        soe_core::FieldType::String => "a string",
        soe_core::FieldType::Integer => "an integer",
        soe_core::FieldType::Number => "a number",
        soe_core::FieldType::Boolean => "a boolean",
        soe_core::FieldType::Object => "an object",
        soe_core::FieldType::List => "a list",
    };
    match &schema.description {
        Some(desc) => format!("{type_name} ({desc})"),
        None => type_name.to_string(),
    }
}

/// What the model actually returned, after contract-aware parsing.
#[derive(Debug, Clone)]
pub struct ParsedResponse {
    pub primary: Value,
    pub selected_signals: Vec<String>,
}

/// Parses the model's raw text against `contract`. Returns `Err` when the
/// contract demands structure the text doesn't contain; the caller treats
/// this as an unparseable-output failure (spec.md §4.5 step 3).
pub fn parse_response(raw: &str, contract: &ResponseContract) -> Result<ParsedResponse> {
    if contract.is_plain() {
        return Ok(ParsedResponse {
            primary: Value::String(raw.trim().to_string()),
            selected_signals: Vec::new(),
        });
    }

    let trimmed = extract_json_object(raw);
    let parsed: Value = serde_json::from_str(trimmed)
        .map_err(|e| SoeError::internal(format!("model response was not valid JSON: {e}")))?;
    let object = parsed
        .as_object()
        .ok_or_else(|| SoeError::internal("model response JSON was not an object"))?;

    let primary = object
        .get("response")
        .cloned()
        .ok_or_else(|| SoeError::internal("model response JSON missing 'response' key"))?;

    let selected_signals = if contract.semantic_signals.is_empty() {
        Vec::new()
    } else {
        object
            .get("selected_signals")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                SoeError::internal("model response JSON missing 'selected_signals' array")
            })?
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect()
    };

    Ok(ParsedResponse {
        primary,
        selected_signals,
    })
}

/// Models occasionally wrap JSON in prose or code fences; take the outermost
/// `{...}` span rather than requiring an exact match.
fn extract_json_object(raw: &str) -> &str {
    let start = raw.find('{');
    let end = raw.rfind('}');
    match (start, end) {
        (Some(s), Some(e)) if e >= s => &raw[s..=e],
        _ => raw.trim(),
    }
}

/// What an agent turn decided (spec.md §4.7 step 1): call a tool, or
/// produce the final response.
#[derive(Debug, Clone)]
pub enum AgentTurn {
    ToolCall { name: String, arguments: Value },
    Final(ParsedResponse),
}

/// Builds the tool-selection-or-final-response prompt for one agent turn.
#[must_use]
pub fn augment_agent_prompt(
    rendered_prompt: &str,
    tool_names: &[String],
    contract: &ResponseContract,
) -> String {
    let mut instructions = String::from("\n\nYou may either call one tool or give your final response.\n");
    if tool_names.is_empty() {
        instructions.push_str("No tools are available; you must give your final response.\n");
    } else {
        instructions.push_str(&format!(
            "Available tools: {}.\nTo call a tool, respond with JSON: {{\"tool_call\": {{\"name\": \"<tool name>\", \"arguments\": {{...}}}}}}\n",
            tool_names.join(", ")
        ));
    }
    instructions.push_str("To give your final response, respond with JSON: {\n  \"response\": ");
    instructions.push_str(&match &contract.output_schema {
        Some(schema) => describe_schema(schema),
        None => "a string".to_string(),
    });
    if !contract.semantic_signals.is_empty() {
        instructions.push_str(",\n  \"selected_signals\": [");
        instructions.push_str(
            &contract
                .semantic_signals
                .iter()
                .map(|(name, desc)| format!("\"{name}\" // emit when: {desc}"))
                .collect::<Vec<_>>()
                .join(", "),
        );
        instructions.push(']');
    }
    instructions.push_str("\n}");
    format!("{rendered_prompt}{instructions}")
}

/// Parse one agent turn: a tool call takes precedence if both keys somehow
/// appear, since a model that names a tool is still mid-task.
pub fn parse_agent_turn(raw: &str, contract: &ResponseContract) -> Result<AgentTurn> {
    let trimmed = extract_json_object(raw);
    let parsed: Value = serde_json::from_str(trimmed)
        .map_err(|e| SoeError::internal(format!("agent response was not valid JSON: {e}")))?;
    let object = parsed
        .as_object()
        .ok_or_else(|| SoeError::internal("agent response JSON was not an object"))?;

    if let Some(tool_call) = object.get("tool_call") {
        let tool_call = tool_call
            .as_object()
            .ok_or_else(|| SoeError::internal("agent tool_call was not an object"))?;
        let name = tool_call
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| SoeError::internal("agent tool_call missing 'name'"))?
            .to_string();
        let arguments = tool_call.get("arguments").cloned().unwrap_or(Value::Null);
        return Ok(AgentTurn::ToolCall { name, arguments });
    }

    parse_response(raw, contract).map(AgentTurn::Final)
}
