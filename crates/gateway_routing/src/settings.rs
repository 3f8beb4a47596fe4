//! Process settings
//!
//! All values are read from environment variables at access time so tests
//! can override them without rebuilding any shared state.

const DEFAULT_PORT: u16 = 3456;
const DEFAULT_OLLAMA_BASE_URL: &str = "http://host.docker.internal:11434";
const DEFAULT_OLLAMA_TIMEOUT_SECONDS: f64 = 300.0;

/// Parse a timeout value with an optional unit suffix.
///
/// Accepts plain numbers (seconds) or `ms`/`s`/`m`/`h` suffixed values.
/// Returns `None` for empty, invalid, or non-positive input.
pub fn parse_timeout_seconds(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(value) = raw.parse::<f64>() {
        return (value > 0.0).then_some(value);
    }

    let units: [(&str, f64); 4] = [("ms", 0.001), ("s", 1.0), ("m", 60.0), ("h", 3600.0)];
    for (suffix, multiplier) in units {
        if let Some(number) = raw.strip_suffix(suffix) {
            let value = number.trim().parse::<f64>().ok()? * multiplier;
            return (value > 0.0).then_some(value);
        }
    }

    None
}

fn env_trimmed(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Centralized environment-backed configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct Settings;

impl Settings {
    pub fn new() -> Self {
        Self
    }

    /// Listen port for the gateway. `CC_PROXY_PORT`, default 3456.
    pub fn proxy_port(&self) -> u16 {
        env_trimmed("CC_PROXY_PORT")
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(DEFAULT_PORT)
    }

    /// Base URL for Ollama. `OLLAMA_BASE_URL`.
    pub fn ollama_base_url(&self) -> String {
        env_trimmed("OLLAMA_BASE_URL").unwrap_or_else(|| DEFAULT_OLLAMA_BASE_URL.to_string())
    }

    /// Request timeout for Ollama in seconds. Reads `OLLAMA_TIMEOUT_SECONDS`
    /// first, then `OLLAMA_LOAD_TIMEOUT`; both accept unit suffixes.
    pub fn ollama_timeout_seconds(&self) -> f64 {
        for name in ["OLLAMA_TIMEOUT_SECONDS", "OLLAMA_LOAD_TIMEOUT"] {
            if let Some(parsed) = env_trimmed(name).as_deref().and_then(parse_timeout_seconds) {
                return parsed;
            }
        }
        DEFAULT_OLLAMA_TIMEOUT_SECONDS
    }

    /// API key required by the auth middleware. `CC_PROXY_AUTH_KEY`.
    /// `None` means the gateway is misconfigured and must fail closed.
    pub fn auth_key(&self) -> Option<String> {
        env_trimmed("CC_PROXY_AUTH_KEY")
    }
}
