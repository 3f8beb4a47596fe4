//! Request adaptation
//!
//! Turns an inbound Messages request into the outbound backend payload:
//! resolves the model alias, drops fields Ollama has no use for, applies the
//! forced-tool-use marker rule, and gates thinking blocks on the resolved
//! model's capability.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Map, Value};

use gateway_models::{MessagesRequest, OpenAIChatCompletionsRequest, OpenAIMessage};
use gateway_routing::{resolve_model, RoutingConfig};

/// Fields dropped for the legacy flattened `/v1/chat/completions` target.
const OPENAI_DROP_FIELDS: &[&str] = &[
    "thinking",
    "reasoning_effort",
    "metadata",
    "prompt_caching",
    "cache_control",
    "tools",
    "tool_choice",
];

/// Fields dropped for the Messages-shaped `/v1/messages` target.
const ANTHROPIC_DROP_FIELDS: &[&str] = &[
    "metadata",
    "prompt_caching",
    "cache_control",
    "tool_choice",
];

static USE_TOOLS_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\buse_tools\b").expect("static pattern"));

const TOOL_USE_SYSTEM_INSTRUCTION: &str =
    "You must call a tool. Do not answer in natural language.";

/// Outcome of the thinking policy pass, used only to decide whether a
/// client-visible warning is needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThinkingPolicyResult {
    pub thinking_blocks: u64,
    pub redacted_blocks: u64,
    pub dropped_blocks: u64,
    pub thinking_capable: bool,
}

impl ThinkingPolicyResult {
    pub fn warning_needed(&self) -> bool {
        self.dropped_blocks > 0
    }
}

/// Adapt a request for the legacy flattened OpenAI-compat target: structured
/// content collapses to a single text string per message.
pub fn to_openai_compat(
    request: &MessagesRequest,
    resolved_model: &str,
) -> OpenAIChatCompletionsRequest {
    let messages = request
        .messages
        .iter()
        .map(|message| OpenAIMessage {
            role: message.role.clone(),
            content: Some(flatten_content(&message.content)),
            extra: Map::new(),
        })
        .collect();

    let mut extra = Map::new();
    for (key, value) in &request.extra {
        if value.is_null()
            || OPENAI_DROP_FIELDS.contains(&key.as_str())
            || matches!(key.as_str(), "temperature" | "stream")
        {
            continue;
        }
        extra.insert(key.clone(), value.clone());
    }

    OpenAIChatCompletionsRequest {
        model: resolved_model.to_string(),
        messages,
        temperature: request.extra.get("temperature").and_then(Value::as_f64),
        max_tokens: request.max_tokens,
        stream: false,
        extra,
    }
}

/// Adapt a request for the Messages-shaped backend target. The payload stays
/// an open object so unknown extension fields pass through untouched except
/// where denylisted.
fn to_anthropic_compat(request: &MessagesRequest, resolved_model: &str) -> Value {
    let mut payload = match serde_json::to_value(request) {
        Ok(Value::Object(map)) => map,
        // MessagesRequest always serializes to an object.
        _ => Map::new(),
    };

    payload.retain(|_, value| !value.is_null());
    for field in ANTHROPIC_DROP_FIELDS {
        payload.remove(*field);
    }

    payload.insert("model".to_string(), json!(resolved_model));
    payload
        .entry("stream".to_string())
        .or_insert(Value::Bool(false));

    if let Some(Value::Array(messages)) = payload.get_mut("messages") {
        for message in messages {
            let Some(message) = message.as_object_mut() else {
                continue;
            };
            let content_ok = matches!(
                message.get("content"),
                Some(Value::String(_)) | Some(Value::Array(_))
            );
            if !content_ok {
                message.insert("content".to_string(), json!(""));
            }
        }
    }

    Value::Object(payload)
}

/// Compose the full request pipeline: alias resolution, payload adaptation,
/// forced-tool-use marker, thinking policy. Returns the adapted payload, the
/// thinking policy outcome, and the resolved backend model name.
pub fn prepare_backend_payload(
    request: &MessagesRequest,
    routing: &RoutingConfig,
) -> (Value, ThinkingPolicyResult, String) {
    let resolved_model = resolve_model(&request.model, routing);
    let mut payload = to_anthropic_compat(request, &resolved_model);

    let use_tools_required = apply_use_tools_marker(&mut payload);
    let has_tools = matches!(payload.get("tools"), Some(Value::Array(tools)) if !tools.is_empty());
    if use_tools_required && has_tools {
        ensure_tool_use_system_instruction(&mut payload);
        if let Some(map) = payload.as_object_mut() {
            map.entry("temperature".to_string()).or_insert(json!(0));
        }
    }

    let thinking_capable = routing.is_thinking_capable(&resolved_model);
    let result = apply_thinking_policy(&mut payload, thinking_capable);
    (payload, result, resolved_model)
}

/// Count and filter `thinking`/`redacted_thinking` blocks in every message
/// whose content is a block list. Scalar string content is never touched;
/// all other block types pass through unchanged, including unknown types.
pub fn apply_thinking_policy(payload: &mut Value, thinking_capable: bool) -> ThinkingPolicyResult {
    let mut result = ThinkingPolicyResult {
        thinking_blocks: 0,
        redacted_blocks: 0,
        dropped_blocks: 0,
        thinking_capable,
    };

    let Some(Value::Array(messages)) = payload.get_mut("messages") else {
        return result;
    };

    for message in messages {
        let Some(Value::Array(content)) = message.get_mut("content") else {
            continue;
        };
        content.retain(|block| {
            let block_type = block.get("type").and_then(Value::as_str);
            match block_type {
                Some("thinking") => {
                    result.thinking_blocks += 1;
                    if !thinking_capable {
                        result.dropped_blocks += 1;
                    }
                    thinking_capable
                }
                Some("redacted_thinking") => {
                    result.redacted_blocks += 1;
                    if !thinking_capable {
                        result.dropped_blocks += 1;
                    }
                    thinking_capable
                }
                _ => true,
            }
        });
    }

    result
}

/// Scan user-message text for the `use_tools` marker, stripping every
/// occurrence. Returns whether any occurrence was found. Only user-authored
/// text is scanned; other roles and non-text blocks are left alone.
fn apply_use_tools_marker(payload: &mut Value) -> bool {
    let Some(Value::Array(messages)) = payload.get_mut("messages") else {
        return false;
    };

    let mut found = false;
    for message in messages {
        let Some(message) = message.as_object_mut() else {
            continue;
        };
        if message.get("role").and_then(Value::as_str) != Some("user") {
            continue;
        }
        match message.get_mut("content") {
            Some(Value::String(text)) => {
                if let Some(stripped) = strip_use_tools_marker(text) {
                    *text = stripped;
                    found = true;
                }
            }
            Some(Value::Array(blocks)) => {
                for block in blocks {
                    let Some(block) = block.as_object_mut() else {
                        continue;
                    };
                    if block.get("type").and_then(Value::as_str) != Some("text") {
                        continue;
                    }
                    if let Some(Value::String(text)) = block.get_mut("text") {
                        if let Some(stripped) = strip_use_tools_marker(text) {
                            *text = stripped;
                            found = true;
                        }
                    }
                }
            }
            _ => {}
        }
    }

    found
}

fn strip_use_tools_marker(text: &str) -> Option<String> {
    if !USE_TOOLS_PATTERN.is_match(text) {
        return None;
    }
    Some(USE_TOOLS_PATTERN.replace_all(text, "").into_owned())
}

/// Append the fixed forced-tool-use instruction to the system prompt,
/// coercing a string or absent prompt into a block list first.
fn ensure_tool_use_system_instruction(payload: &mut Value) {
    let Some(map) = payload.as_object_mut() else {
        return;
    };
    let mut blocks = match map.remove("system") {
        Some(Value::String(text)) => vec![json!({"type": "text", "text": text})],
        Some(Value::Array(blocks)) => blocks,
        Some(other) => vec![json!({"type": "text", "text": other.to_string()})],
        None => Vec::new(),
    };
    blocks.push(json!({"type": "text", "text": TOOL_USE_SYSTEM_INSTRUCTION}));
    map.insert("system".to_string(), Value::Array(blocks));
}

fn flatten_content(content: &Value) -> String {
    match content {
        Value::String(text) => text.clone(),
        Value::Array(blocks) => {
            let parts: Vec<&str> = blocks
                .iter()
                .filter(|block| block.get("type").and_then(Value::as_str) == Some("text"))
                .filter_map(|block| block.get("text").and_then(Value::as_str))
                .map(str::trim)
                .filter(|text| !text.is_empty())
                .collect();
            parts.join("\n\n")
        }
        _ => String::new(),
    }
}
