//! Wire types for the gateway
//!
//! Anthropic Messages API shapes on the inbound side and the OpenAI-compat
//! shapes Ollama's `/v1/chat/completions` endpoint accepts on the outbound
//! side. All request/response types keep unknown fields in an explicit
//! extra-field bag so vendor protocol drift round-trips without data loss.

pub mod anthropic;
pub mod openai;

pub use anthropic::{
    ContentBlock, ErrorDetail, ErrorEnvelope, Message, MessagesRequest, MessagesResponse, Usage,
};
pub use openai::{
    OpenAIChatCompletionsRequest, OpenAIChatCompletionsResponse, OpenAIChoice, OpenAIMessage,
    OpenAIUsage,
};
