//! Ollama transport
//!
//! The one outbound dependency of the gateway: a pooled reqwest client for
//! Ollama's Messages-compatible and chat-completions endpoints plus the
//! model introspection endpoint used for tool-capability detection.

pub mod capability;
pub mod client;
pub mod error;

pub use capability::{get_tool_capability, CapabilityCache, ToolCapability};
pub use client::{ByteStream, OllamaClient, OllamaClientTrait};
pub use error::OllamaClientError;
