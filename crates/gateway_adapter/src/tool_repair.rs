//! Tool use repair
//!
//! Backend models frequently hallucinate tool names, omit IDs, or serialize
//! structured input as a JSON string instead of a native object. This module
//! normalizes such blocks into a protocol-valid shape without ever
//! fabricating a call to a tool the request did not declare.

use std::collections::HashSet;

use serde_json::{json, Value};
use sha2::{Digest, Sha256};

/// Counters describing what a repair pass changed. Never identities, only
/// totals; accumulated per response or per streamed block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ToolRepairStats {
    pub parsed_stringified_input: u64,
    pub added_ids: u64,
    pub dropped_invalid_tools: u64,
}

impl ToolRepairStats {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Anything was normalized in place (as opposed to dropped).
    pub fn repaired(&self) -> bool {
        self.added_ids > 0 || self.parsed_stringified_input > 0
    }

    pub fn merge(&mut self, other: &ToolRepairStats) {
        self.parsed_stringified_input += other.parsed_stringified_input;
        self.added_ids += other.added_ids;
        self.dropped_invalid_tools += other.dropped_invalid_tools;
    }
}

/// Deterministic ID for a tool_use block missing one. Hashes the tool name,
/// the canonical (sorted-key, compact) JSON of its input, and the block's
/// position in the content array, so repeated repair passes over the same
/// logical content yield the same ID.
fn generate_tool_use_id(name: &str, input: &Value, position: usize) -> String {
    // serde_json::Map keeps keys sorted, so to_string is already canonical.
    let input_str = serde_json::to_string(input).unwrap_or_else(|_| input.to_string());
    let mut hasher = Sha256::new();
    hasher.update(format!("{name}:{input_str}:{position}").as_bytes());
    let digest = hex::encode(hasher.finalize());
    format!("toolu_{}", &digest[..16])
}

fn known_tool_names(request_tools: &[Value]) -> HashSet<String> {
    request_tools
        .iter()
        .filter_map(|tool| tool.get("name"))
        .filter_map(Value::as_str)
        .map(|name| name.trim().to_lowercase())
        .filter(|name| !name.is_empty())
        .collect()
}

/// Repair every `tool_use` block in `content`, passing all other blocks
/// through unchanged in their original order.
///
/// `request_tools` is the tool list declared by the original request.
/// `None` means the caller did not declare tools at all, which skips name
/// validation entirely; a `Some` set replaces blocks naming unknown tools
/// with an explanatory text block.
pub fn repair_tool_use_blocks(
    content: &[Value],
    request_tools: Option<&[Value]>,
) -> (Vec<Value>, ToolRepairStats) {
    let mut stats = ToolRepairStats::default();
    let tool_name_set = request_tools.map(known_tool_names);

    let mut repaired = Vec::with_capacity(content.len());
    for (position, block) in content.iter().enumerate() {
        let is_tool_use = block
            .get("type")
            .and_then(Value::as_str)
            .map(|block_type| block_type == "tool_use")
            .unwrap_or(false);
        if !block.is_object() || !is_tool_use {
            repaired.push(block.clone());
            continue;
        }

        let mut tool_block = block.clone();
        let tool_name = tool_block
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or("")
            .trim()
            .to_string();

        let raw_input = match tool_block.get("input") {
            Some(Value::String(raw)) => Some(raw.clone()),
            _ => None,
        };
        if let Some(raw_input) = raw_input {
            match serde_json::from_str::<Value>(&raw_input) {
                Ok(parsed) => {
                    tool_block["input"] = parsed;
                    stats.parsed_stringified_input += 1;
                }
                Err(_) => {
                    // Not fatal: the stringified input stays as-is.
                    log::warn!("Invalid JSON in tool_use input for tool '{tool_name}'");
                }
            }
        }

        let id_missing = tool_block
            .get("id")
            .and_then(Value::as_str)
            .map(str::is_empty)
            .unwrap_or(true);
        if id_missing {
            let input = tool_block.get("input").cloned().unwrap_or(Value::Null);
            tool_block["id"] = json!(generate_tool_use_id(&tool_name, &input, position));
            stats.added_ids += 1;
        }

        if let Some(known) = &tool_name_set {
            if tool_name.is_empty() || !known.contains(&tool_name.to_lowercase()) {
                stats.dropped_invalid_tools += 1;
                let shown = if tool_name.is_empty() {
                    "unknown"
                } else {
                    &tool_name
                };
                repaired.push(json!({
                    "type": "text",
                    "text": format!("[Tool '{shown}' not available]"),
                }));
                continue;
            }
        }

        repaired.push(tool_block);
    }

    (repaired, stats)
}
