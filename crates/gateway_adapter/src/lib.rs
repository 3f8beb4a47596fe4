//! Protocol translation pipeline
//!
//! Adapts inbound Anthropic Messages requests into backend-compatible
//! payloads and adapts backend replies (whole or streamed) back into the
//! Messages protocol, repairing malformed tool_use blocks along the way.

pub mod request;
pub mod response;
pub mod streaming;
pub mod tool_repair;

pub use request::{
    apply_thinking_policy, prepare_backend_payload, to_openai_compat, ThinkingPolicyResult,
};
pub use response::{adapt_response, AdapterError};
pub use streaming::StreamTranslator;
pub use tool_repair::{repair_tool_use_blocks, ToolRepairStats};
