use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use thiserror::Error;

use gateway_adapter::AdapterError;
use gateway_models::ErrorEnvelope;
use ollama_client::OllamaClientError;

pub type Result<T, E = AppError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    InvalidRequest(String),

    #[error("Upstream request failed: {0}")]
    Upstream(#[from] OllamaClientError),

    #[error("Upstream response could not be adapted: {0}")]
    UpstreamPayload(#[from] AdapterError),
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
            AppError::UpstreamPayload(_) => StatusCode::BAD_GATEWAY,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let envelope = match self {
            AppError::InvalidRequest(message) => ErrorEnvelope::invalid_request(message.clone()),
            other => ErrorEnvelope::api_error(other.to_string()),
        };
        HttpResponse::build(self.status_code()).json(envelope)
    }
}
