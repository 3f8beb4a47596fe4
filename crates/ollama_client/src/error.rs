use thiserror::Error;

#[derive(Debug, Error)]
pub enum OllamaClientError {
    #[error("Ollama connection failed: {0}")]
    ConnectionFailed(#[from] reqwest::Error),

    #[error("Ollama upstream error (status {status})")]
    UpstreamStatus { status: u16, body: String },

    #[error("Ollama returned a non-JSON body")]
    InvalidBody(#[source] serde_json::Error),
}
