//! Response adaptation (non-streaming)
//!
//! Normalizes a whole backend JSON response into a protocol-valid Messages
//! response: the client must never see the backend's internal model name,
//! and tool_use blocks get repaired before validation.

use serde_json::{json, Value};
use thiserror::Error;

use crate::tool_repair::{repair_tool_use_blocks, ToolRepairStats};
use gateway_models::MessagesResponse;

#[derive(Debug, Error)]
pub enum AdapterError {
    /// The backend returned something that cannot be normalized into a
    /// Messages response. Surfaces as a 502 upstream error.
    #[error("Invalid Ollama response payload")]
    InvalidUpstreamPayload(#[source] Option<serde_json::Error>),
}

/// Adapt the raw backend response for the client.
///
/// `model` is the client-facing (pre-resolution) model name; it overwrites
/// whatever the backend reported. `request_tools` is the tool list declared
/// by the original request; `None` skips tool repair entirely.
pub fn adapt_response(
    payload: Value,
    model: &str,
    request_tools: Option<&[Value]>,
) -> Result<(MessagesResponse, ToolRepairStats), AdapterError> {
    let Value::Object(mut normalized) = payload else {
        return Err(AdapterError::InvalidUpstreamPayload(None));
    };

    normalized.insert("model".to_string(), json!(model));

    let mut stats = ToolRepairStats::default();
    match normalized.get("content") {
        Some(Value::Array(_)) => {
            if let Some(tools) = request_tools {
                let content = match normalized.remove("content") {
                    Some(Value::Array(content)) => content,
                    _ => Vec::new(),
                };
                let (repaired, repair_stats) = repair_tool_use_blocks(&content, Some(tools));
                stats = repair_stats;
                normalized.insert("content".to_string(), Value::Array(repaired));
            }
        }
        Some(_) => {
            // Defensive: a non-list content field is coerced rather than
            // failing the whole response.
            normalized.insert("content".to_string(), json!([]));
        }
        None => {}
    }

    let response = serde_json::from_value::<MessagesResponse>(Value::Object(normalized))
        .map_err(|err| AdapterError::InvalidUpstreamPayload(Some(err)))?;
    Ok((response, stats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_models::ContentBlock;

    fn tools(names: &[&str]) -> Vec<Value> {
        names
            .iter()
            .map(|name| json!({"name": name, "input_schema": {}}))
            .collect()
    }

    #[test]
    fn model_name_is_substituted() {
        let payload = json!({
            "id": "msg_1",
            "type": "message",
            "role": "assistant",
            "model": "modelX",
            "content": [{"type": "text", "text": "hi"}],
            "usage": {"input_tokens": 3, "output_tokens": 5}
        });
        let (response, stats) = adapt_response(payload, "sonnet", None).unwrap();
        assert_eq!(response.model, "sonnet");
        assert_eq!(response.usage.input_tokens, 3);
        assert!(stats.is_empty());
    }

    #[test]
    fn non_object_payload_is_rejected() {
        assert!(adapt_response(json!("nope"), "m", None).is_err());
        assert!(adapt_response(json!([1, 2]), "m", None).is_err());
    }

    #[test]
    fn non_list_content_is_coerced_to_empty() {
        let payload = json!({"model": "x", "content": "oops"});
        let (response, _) = adapt_response(payload, "m", None).unwrap();
        assert!(response.content.is_empty());
    }

    #[test]
    fn tool_blocks_are_repaired_when_tools_declared() {
        let payload = json!({
            "model": "x",
            "content": [
                {"type": "tool_use", "name": "read_file", "input": "{\"path\": \"a\"}"},
                {"type": "tool_use", "id": "toolu_1", "name": "bogus", "input": {}}
            ]
        });
        let declared = tools(&["read_file"]);
        let (response, stats) = adapt_response(payload, "m", Some(&declared)).unwrap();
        assert_eq!(stats.parsed_stringified_input, 1);
        assert_eq!(stats.added_ids, 1);
        assert_eq!(stats.dropped_invalid_tools, 1);
        assert_eq!(response.content.len(), 2);
        assert_eq!(response.content[1].block_type(), Some("text"));
    }

    #[test]
    fn content_untouched_without_declared_tools() {
        let payload = json!({
            "model": "x",
            "content": [{"type": "tool_use", "name": "anything", "input": {}}]
        });
        let (response, stats) = adapt_response(payload, "m", None).unwrap();
        assert!(stats.is_empty());
        // No repair pass ran, so the missing id survives into the typed
        // fallback variant.
        assert!(matches!(response.content[0], ContentBlock::Other(_)));
    }

    #[test]
    fn unknown_response_fields_are_preserved() {
        let payload = json!({
            "model": "x",
            "content": [],
            "vendor_metric": {"ttfb_ms": 12}
        });
        let (response, _) = adapt_response(payload, "m", None).unwrap();
        assert!(response.extra.contains_key("vendor_metric"));
    }
}
