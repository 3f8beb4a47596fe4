//! The `/v1/messages` endpoint.
//!
//! One handler covers both delivery modes: a whole adapted response for
//! `stream: false`, a translated SSE relay for `stream: true`. Routing
//! config is re-read per request so edits to either config file take
//! effect without a restart.

use actix_web::http::header::HeaderMap;
use actix_web::{post, web, HttpRequest, HttpResponse};
use async_stream::stream;
use bytes::Bytes;
use futures_util::StreamExt;
use serde_json::Value;

use crate::error::AppError;
use crate::server::AppState;
use gateway_adapter::{adapt_response, prepare_backend_payload, StreamTranslator};
use gateway_models::{ErrorEnvelope, MessagesRequest};
use gateway_routing::{load_routing_config, RoutingConfig};
use ollama_client::{get_tool_capability, ToolCapability};

const WARNING_HEADER: &str = "X-CC-Proxy-Warning";

const SENSITIVE_HEADERS: &[&str] = &["authorization", "x-api-key"];

/// Header dump for the debug_logging toggles. Credential-bearing headers
/// are redacted, never logged.
fn redacted_headers(headers: &HeaderMap) -> String {
    headers
        .iter()
        .map(|(name, value)| {
            let shown = if SENSITIVE_HEADERS.contains(&name.as_str()) {
                "[REDACTED]"
            } else {
                value.to_str().unwrap_or("[non-ascii]")
            };
            format!("{name}: {shown}")
        })
        .collect::<Vec<_>>()
        .join(", ")
}

#[post("/messages")]
pub async fn messages(
    app_state: web::Data<AppState>,
    http_req: HttpRequest,
    req: web::Json<MessagesRequest>,
) -> Result<HttpResponse, AppError> {
    let request = req.into_inner();

    let routing = match load_routing_config(&app_state.config_paths) {
        Ok(config) => config,
        Err(err) => {
            log::warn!("Failed to load routing config, using defaults: {err}");
            RoutingConfig::default()
        }
    };

    if routing.debug_logging.request_headers {
        log::debug!("Request headers: {}", redacted_headers(http_req.headers()));
    }

    let (payload, thinking, resolved_model) = prepare_backend_payload(&request, &routing);
    log::debug!("model.resolved: '{}' -> '{resolved_model}'", request.model);
    if thinking.dropped_blocks > 0 {
        log::info!(
            "thinking.blocks_dropped: {} (model '{resolved_model}' is not thinking-capable)",
            thinking.dropped_blocks
        );
    }
    let request_tools: Option<Vec<Value>> = request.tools().cloned();

    if request_tools.is_some() {
        let capability = get_tool_capability(
            &resolved_model,
            &routing,
            app_state.ollama_client.as_ref(),
            &app_state.capability_cache,
        )
        .await;
        if capability == ToolCapability::None {
            return Err(AppError::InvalidRequest(format!(
                "Model '{resolved_model}' does not support tool calling"
            )));
        }
    }

    let streaming = request.stream();
    if streaming && request_tools.is_some() && !routing.tool_call_streaming_enabled {
        return Err(AppError::InvalidRequest(
            "Tool-call streaming is disabled. Retry with stream=false.".to_string(),
        ));
    }

    if routing.debug_logging.request_body {
        log::debug!("Adapted backend payload: {payload}");
    }

    let mut warnings: Vec<&str> = Vec::new();
    if thinking.warning_needed() {
        warnings.push("thinking_dropped");
    }

    if streaming {
        let upstream = app_state
            .ollama_client
            .chat_anthropic_compat_stream(&payload)
            .await?;
        let verbose = routing.verbose_tool_logging;
        let body = stream! {
            let mut translator = StreamTranslator::new(request_tools);
            let mut upstream = upstream;
            while let Some(next) = upstream.next().await {
                match next {
                    Ok(chunk) => {
                        for frame in translator.push_chunk(&chunk) {
                            yield Ok::<Bytes, AppError>(Bytes::from(frame));
                        }
                    }
                    Err(err) => {
                        log::error!("Upstream stream failed mid-flight: {err}");
                        let envelope = ErrorEnvelope::api_error(format!("Stream error: {err}"));
                        let payload = serde_json::to_string(&envelope).unwrap_or_default();
                        yield Ok::<Bytes, AppError>(Bytes::from(format!("data: {payload}\n\n")));
                        yield Ok::<Bytes, AppError>(Bytes::from("data: [DONE]\n\n"));
                        break;
                    }
                }
            }
            translator.finish();
            let stats = translator.stats();
            if verbose && !stats.is_empty() {
                log::info!(
                    "Streamed tool_use repair: parsed_input={} added_ids={} dropped={}",
                    stats.parsed_stringified_input,
                    stats.added_ids,
                    stats.dropped_invalid_tools,
                );
            }
        };

        let mut builder = HttpResponse::Ok();
        builder.content_type("text/event-stream");
        if !warnings.is_empty() {
            builder.insert_header((WARNING_HEADER, warnings.join(",")));
        }
        let response = builder.streaming(body);
        if routing.debug_logging.response_headers {
            log::debug!("Response headers: {}", redacted_headers(response.headers()));
        }
        return Ok(response);
    }

    let upstream = app_state.ollama_client.chat_anthropic_compat(&payload).await?;
    if routing.debug_logging.response_body {
        log::debug!("Upstream response body: {upstream}");
    }

    let (adapted, stats) = adapt_response(upstream, &request.model, request_tools.as_deref())?;
    if routing.verbose_tool_logging && !stats.is_empty() {
        log::info!(
            "Tool_use repair: parsed_input={} added_ids={} dropped={}",
            stats.parsed_stringified_input,
            stats.added_ids,
            stats.dropped_invalid_tools,
        );
    }
    if stats.repaired() {
        warnings.push("tool_use_repaired");
    }
    if stats.dropped_invalid_tools > 0 {
        warnings.push("tool_use_dropped");
    }

    let mut builder = HttpResponse::Ok();
    if !warnings.is_empty() {
        builder.insert_header((WARNING_HEADER, warnings.join(",")));
    }
    let response = builder.json(adapted);
    if routing.debug_logging.response_headers {
        log::debug!("Response headers: {}", redacted_headers(response.headers()));
    }
    Ok(response)
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(messages);
}
