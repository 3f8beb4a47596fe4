use futures_util::StreamExt;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use ollama_client::{OllamaClient, OllamaClientError, OllamaClientTrait};

#[tokio::test]
async fn chat_posts_payload_and_returns_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(body_partial_json(json!({"model": "qwen2.5"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "qwen2.5",
            "content": [{"type": "text", "text": "hi"}]
        })))
        .mount(&server)
        .await;

    let client = OllamaClient::new(&server.uri(), 5.0);
    let payload = json!({"model": "qwen2.5", "messages": [], "stream": false});
    let response = client.chat_anthropic_compat(&payload).await.unwrap();
    assert_eq!(response["content"][0]["text"], "hi");
}

#[tokio::test]
async fn upstream_error_status_is_surfaced() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .mount(&server)
        .await;

    let client = OllamaClient::new(&server.uri(), 5.0);
    let payload = json!({"model": "qwen2.5", "messages": []});
    let err = client.chat_anthropic_compat(&payload).await.unwrap_err();
    match err {
        OllamaClientError::UpstreamStatus { status, body } => {
            assert_eq!(status, 503);
            assert_eq!(body, "overloaded");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn legacy_chat_completions_round_trip() {
    use gateway_models::{OpenAIChatCompletionsRequest, OpenAIMessage};
    use serde_json::Map;

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({"model": "qwen2.5"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "chatcmpl-1",
            "model": "qwen2.5",
            "choices": [{"message": {"role": "assistant", "content": "hello"}}]
        })))
        .mount(&server)
        .await;

    let client = OllamaClient::new(&server.uri(), 5.0);
    let request = OpenAIChatCompletionsRequest {
        model: "qwen2.5".to_string(),
        messages: vec![OpenAIMessage {
            role: "user".to_string(),
            content: Some("hi".to_string()),
            extra: Map::new(),
        }],
        temperature: None,
        max_tokens: None,
        stream: false,
        extra: Map::new(),
    };
    let response = client.chat_openai_compat(&request).await.unwrap();
    assert_eq!(response.choices[0].message.content.as_deref(), Some("hello"));
}

#[tokio::test]
async fn show_model_sends_model_name() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/show"))
        .and(body_partial_json(json!({"model": "llama3.1"})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"capabilities": ["completion", "tools"]})),
        )
        .mount(&server)
        .await;

    let client = OllamaClient::new(&server.uri(), 5.0);
    let data = client.show_model("llama3.1").await.unwrap();
    assert_eq!(data["capabilities"][1], "tools");
}

#[tokio::test]
async fn streaming_yields_raw_bytes() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("data: {\"type\":\"ping\"}\n\ndata: [DONE]\n\n"),
        )
        .mount(&server)
        .await;

    let client = OllamaClient::new(&server.uri(), 5.0);
    let payload = json!({"model": "qwen2.5", "messages": [], "stream": true});
    let mut stream = client.chat_anthropic_compat_stream(&payload).await.unwrap();

    let mut collected = Vec::new();
    while let Some(chunk) = stream.next().await {
        collected.extend_from_slice(&chunk.unwrap());
    }
    let body = String::from_utf8(collected).unwrap();
    assert!(body.contains("data: {\"type\":\"ping\"}"));
    assert!(body.contains("data: [DONE]"));
}

#[tokio::test]
async fn error_stream_reports_status_before_yielding() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let client = OllamaClient::new(&server.uri(), 5.0);
    let payload = json!({"model": "qwen2.5", "messages": [], "stream": true});
    let err = match client.chat_anthropic_compat_stream(&payload).await {
        Ok(_) => panic!("expected error"),
        Err(err) => err,
    };
    assert!(matches!(
        err,
        OllamaClientError::UpstreamStatus { status: 500, .. }
    ));
}
