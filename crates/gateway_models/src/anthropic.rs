//! Anthropic Messages API Models
//!
//! Minimal subset of the Messages API that Claude Code sends. Kept
//! permissive: only `model` and `messages` are required, everything else
//! rides in the extra-field bag and is merged back on serialization.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single conversation message. Role is open-ended (at least
/// user/assistant); content is either free text or a list of content blocks,
/// accepted as-is and normalized by the adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: Value,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Anthropic Messages API request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagesRequest {
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MessagesRequest {
    /// Declared tools, if the request carries a non-empty `tools` array.
    pub fn tools(&self) -> Option<&Vec<Value>> {
        match self.extra.get("tools") {
            Some(Value::Array(tools)) if !tools.is_empty() => Some(tools),
            _ => None,
        }
    }

    /// Whether the request asks for a streamed response.
    pub fn stream(&self) -> bool {
        matches!(self.extra.get("stream"), Some(Value::Bool(true)))
    }
}

/// Content block union, tagged by `type`. Unknown block types fall through
/// to [`ContentBlock::Other`] and round-trip opaquely.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContentBlock {
    Known(KnownContentBlock),
    Other(Value),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum KnownContentBlock {
    Text {
        text: String,
        #[serde(flatten)]
        extra: Map<String, Value>,
    },
    Thinking {
        thinking: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        signature: Option<String>,
        #[serde(flatten)]
        extra: Map<String, Value>,
    },
    RedactedThinking {
        data: String,
        #[serde(flatten)]
        extra: Map<String, Value>,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
        #[serde(flatten)]
        extra: Map<String, Value>,
    },
    ToolResult {
        tool_use_id: String,
        content: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        is_error: Option<bool>,
        #[serde(flatten)]
        extra: Map<String, Value>,
    },
}

impl ContentBlock {
    /// The `type` tag of this block, when present.
    pub fn block_type(&self) -> Option<&str> {
        match self {
            ContentBlock::Known(KnownContentBlock::Text { .. }) => Some("text"),
            ContentBlock::Known(KnownContentBlock::Thinking { .. }) => Some("thinking"),
            ContentBlock::Known(KnownContentBlock::RedactedThinking { .. }) => {
                Some("redacted_thinking")
            }
            ContentBlock::Known(KnownContentBlock::ToolUse { .. }) => Some("tool_use"),
            ContentBlock::Known(KnownContentBlock::ToolResult { .. }) => Some("tool_result"),
            ContentBlock::Other(value) => value.get("type").and_then(Value::as_str),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn message_type() -> String {
    "message".to_string()
}

fn assistant_role() -> String {
    "assistant".to_string()
}

/// Anthropic Messages API response, validated against normalized upstream
/// payloads by the response adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagesResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type", default = "message_type")]
    pub response_type: String,
    #[serde(default = "assistant_role")]
    pub role: String,
    pub model: String,
    #[serde(default)]
    pub content: Vec<ContentBlock>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_sequence: Option<String>,
    #[serde(default)]
    pub usage: Usage,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Anthropic-style error envelope: `{"type": "error", "error": {...}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    #[serde(rename = "type")]
    pub error_type: String,
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    #[serde(rename = "type")]
    pub error_type: String,
    pub message: String,
}

impl ErrorEnvelope {
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self {
            error_type: "error".to_string(),
            error: ErrorDetail {
                error_type: "invalid_request_error".to_string(),
                message: message.into(),
            },
        }
    }

    pub fn api_error(message: impl Into<String>) -> Self {
        Self {
            error_type: "error".to_string(),
            error: ErrorDetail {
                error_type: "api_error".to_string(),
                message: message.into(),
            },
        }
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Self {
            error_type: "error".to_string(),
            error: ErrorDetail {
                error_type: "authentication_error".to_string(),
                message: message.into(),
            },
        }
    }
}
