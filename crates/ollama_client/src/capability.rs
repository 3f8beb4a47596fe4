//! Tool-capability detection
//!
//! Whether a resolved model supports structured tool calling. The routing
//! snapshot's allow-list answers first; otherwise the backend is asked once
//! and the verdict cached for the life of the process. Introspection
//! failures are never cached and fail closed: the gateway must not claim
//! tool support it could not verify.

use dashmap::DashMap;
use serde_json::Value;

use crate::client::OllamaClientTrait;
use gateway_routing::RoutingConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolCapability {
    Structured,
    None,
}

impl ToolCapability {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolCapability::Structured => "structured",
            ToolCapability::None => "none",
        }
    }
}

/// Process-wide model -> capability map. Models are a small, slowly
/// changing set, so there is no eviction. Owned by whoever composes the
/// gateway and passed by handle, never an ambient global.
pub type CapabilityCache = DashMap<String, ToolCapability>;

fn normalize_capabilities(value: Option<&Value>) -> Vec<String> {
    let Some(Value::Array(items)) = value else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(Value::as_str)
        .map(|item| item.trim().to_lowercase())
        .filter(|item| !item.is_empty())
        .collect()
}

pub async fn get_tool_capability(
    model: &str,
    routing: &RoutingConfig,
    client: &dyn OllamaClientTrait,
    cache: &CapabilityCache,
) -> ToolCapability {
    if routing.is_tool_calling_capable(model) {
        return ToolCapability::Structured;
    }

    if let Some(cached) = cache.get(model) {
        return *cached;
    }

    match client.show_model(model).await {
        Ok(data) => {
            let capabilities = normalize_capabilities(data.get("capabilities"));
            let capability = if capabilities.iter().any(|item| item == "tools") {
                ToolCapability::Structured
            } else {
                ToolCapability::None
            };
            cache.insert(model.to_string(), capability);
            capability
        }
        Err(err) => {
            log::warn!("Tool capability detection failed for '{model}'; defaulting to none: {err}");
            ToolCapability::None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ByteStream;
    use crate::error::OllamaClientError;
    use async_trait::async_trait;
    use gateway_models::{OpenAIChatCompletionsRequest, OpenAIChatCompletionsResponse};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scripted backend: returns a fixed introspection document and counts
    /// how many times it was asked.
    struct StubClient {
        show_response: Result<Value, ()>,
        show_calls: AtomicUsize,
    }

    impl StubClient {
        fn new(show_response: Result<Value, ()>) -> Self {
            Self {
                show_response,
                show_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl OllamaClientTrait for StubClient {
        async fn chat_anthropic_compat(&self, _: &Value) -> Result<Value, OllamaClientError> {
            unimplemented!("not used by capability tests")
        }

        async fn chat_anthropic_compat_stream(
            &self,
            _: &Value,
        ) -> Result<ByteStream, OllamaClientError> {
            unimplemented!("not used by capability tests")
        }

        async fn chat_openai_compat(
            &self,
            _: &OpenAIChatCompletionsRequest,
        ) -> Result<OpenAIChatCompletionsResponse, OllamaClientError> {
            unimplemented!("not used by capability tests")
        }

        async fn show_model(&self, _: &str) -> Result<Value, OllamaClientError> {
            self.show_calls.fetch_add(1, Ordering::SeqCst);
            match &self.show_response {
                Ok(value) => Ok(value.clone()),
                Err(()) => Err(OllamaClientError::UpstreamStatus {
                    status: 500,
                    body: String::new(),
                }),
            }
        }
    }

    fn routing_allowing(models: &[&str]) -> RoutingConfig {
        RoutingConfig {
            tool_calling_capable_models: models.iter().map(|m| m.to_string()).collect(),
            ..RoutingConfig::default()
        }
    }

    #[tokio::test]
    async fn allow_listed_model_skips_backend_call() {
        let client = StubClient::new(Ok(json!({})));
        let cache = CapabilityCache::new();
        let routing = routing_allowing(&["qwen2.5"]);
        let capability = get_tool_capability("qwen2.5", &routing, &client, &cache).await;
        assert_eq!(capability, ToolCapability::Structured);
        assert_eq!(client.show_calls.load(Ordering::SeqCst), 0);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn introspection_result_is_cached() {
        let client = StubClient::new(Ok(json!({"capabilities": ["completion", "Tools"]})));
        let cache = CapabilityCache::new();
        let routing = RoutingConfig::default();

        let first = get_tool_capability("llama3.1", &routing, &client, &cache).await;
        let second = get_tool_capability("llama3.1", &routing, &client, &cache).await;
        assert_eq!(first, ToolCapability::Structured);
        assert_eq!(second, ToolCapability::Structured);
        assert_eq!(client.show_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn missing_tools_capability_is_none() {
        let client = StubClient::new(Ok(json!({"capabilities": ["completion"]})));
        let cache = CapabilityCache::new();
        let capability =
            get_tool_capability("llama2", &RoutingConfig::default(), &client, &cache).await;
        assert_eq!(capability, ToolCapability::None);
        assert_eq!(cache.get("llama2").map(|v| *v), Some(ToolCapability::None));
    }

    #[tokio::test]
    async fn introspection_failure_defaults_to_none_without_caching() {
        let client = StubClient::new(Err(()));
        let cache = CapabilityCache::new();
        let routing = RoutingConfig::default();

        let capability = get_tool_capability("flaky", &routing, &client, &cache).await;
        assert_eq!(capability, ToolCapability::None);
        assert!(cache.is_empty());

        // A later attempt retries the backend instead of trusting a stale
        // failure verdict.
        let _ = get_tool_capability("flaky", &routing, &client, &cache).await;
        assert_eq!(client.show_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn malformed_capabilities_field_is_none() {
        let client = StubClient::new(Ok(json!({"capabilities": "tools"})));
        let cache = CapabilityCache::new();
        let capability =
            get_tool_capability("odd", &RoutingConfig::default(), &client, &cache).await;
        assert_eq!(capability, ToolCapability::None);
    }
}
