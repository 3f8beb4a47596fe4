//! Two-tier routing configuration
//!
//! The base file (`config/cc-proxy.yaml`) is the authoritative list of known
//! aliases; the user file (`~/.cc-proxy/cc-proxy.user.yaml`) supplies the
//! concrete backend model names. An alias is only remapped when it appears
//! in both files. The snapshot is rebuilt from file contents on every call,
//! so concurrent requests never observe a partially merged config.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RoutingError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Immutable routing snapshot produced by [`load_routing_config`].
#[derive(Debug, Clone, Default)]
pub struct RoutingConfig {
    pub alias_to_model: HashMap<String, String>,
    pub default_alias: Option<String>,
    /// Declared-but-unimplemented capabilities per alias. Informational only.
    pub promises: HashMap<String, Value>,
    pub debug_logging: DebugLogging,
    pub thinking_capable_models: HashSet<String>,
    pub tool_calling_capable_models: HashSet<String>,
    pub verbose_tool_logging: bool,
    pub tool_call_streaming_enabled: bool,
    pub ollama_timeout_seconds: Option<f64>,
}

impl RoutingConfig {
    pub fn is_thinking_capable(&self, model: &str) -> bool {
        self.thinking_capable_models.contains(model)
    }

    pub fn is_tool_calling_capable(&self, model: &str) -> bool {
        self.tool_calling_capable_models.contains(model)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DebugLogging {
    pub request_headers: bool,
    pub request_body: bool,
    pub response_headers: bool,
    pub response_body: bool,
}

/// Locations of the two config files. Injectable so tests can point at
/// temporary directories.
#[derive(Debug, Clone)]
pub struct ConfigPaths {
    pub base: PathBuf,
    pub user: PathBuf,
}

impl ConfigPaths {
    /// Default locations: base file next to the gateway install, user file
    /// under the home directory with a repo-local fallback.
    pub fn discover(repo_root: &Path) -> Self {
        let base = repo_root.join("config").join("cc-proxy.yaml");
        let home_user = dirs::home_dir().map(|home| home.join(".cc-proxy").join("cc-proxy.user.yaml"));
        let repo_user = repo_root.join(".cc-proxy").join("cc-proxy.user.yaml");
        let user = match home_user {
            Some(path) if path.exists() => path,
            _ => repo_user,
        };
        Self { base, user }
    }
}

/// Base config file shape. Alias entries are either a bare backend model
/// name or an object carrying a `promise` sub-object.
#[derive(Debug, Default, Deserialize)]
struct RawBaseConfig {
    #[serde(default)]
    aliases: BTreeMap<String, RawAliasEntry>,
    #[serde(default)]
    default_alias: Option<String>,
    #[serde(default)]
    thinking_capable_models: Vec<String>,
    #[serde(default)]
    tool_calling_capable_models: Vec<String>,
    #[serde(default)]
    verbose_tool_logging: bool,
    #[serde(default)]
    tool_call_streaming_enabled: bool,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawAliasEntry {
    // The base file's bare target name is informational; the user file
    // supplies the mapping actually honored.
    #[allow(dead_code)]
    Name(String),
    Detailed {
        #[serde(default)]
        promise: Option<Value>,
    },
}

#[derive(Debug, Default, Deserialize)]
struct RawUserConfig {
    #[serde(default)]
    aliases: BTreeMap<String, String>,
    #[serde(default)]
    debug_logging: BTreeMap<String, bool>,
    #[serde(default)]
    verbose_tool_logging: Option<bool>,
    #[serde(default)]
    tool_call_streaming_enabled: Option<bool>,
    #[serde(default)]
    tool_calling_capable_models: Option<Vec<String>>,
    #[serde(default)]
    ollama_timeout_seconds: Option<f64>,
}

fn read_yaml<T>(path: &Path) -> Result<T, RoutingError>
where
    T: Default + for<'de> Deserialize<'de>,
{
    if !path.exists() {
        return Ok(T::default());
    }
    let content = std::fs::read_to_string(path).map_err(|source| RoutingError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    if content.trim().is_empty() {
        return Ok(T::default());
    }
    serde_yaml::from_str(&content).map_err(|source| RoutingError::Yaml {
        path: path.to_path_buf(),
        source,
    })
}

fn collect_model_set(models: &[String]) -> HashSet<String> {
    models
        .iter()
        .map(|name| name.trim())
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

/// Load and merge both config files into a fresh snapshot.
pub fn load_routing_config(paths: &ConfigPaths) -> Result<RoutingConfig, RoutingError> {
    let base: RawBaseConfig = read_yaml(&paths.base)?;
    let user: RawUserConfig = read_yaml(&paths.user)?;

    let mut alias_to_model = HashMap::new();
    let mut promises = HashMap::new();
    for (alias, entry) in &base.aliases {
        // The base file gates which aliases are honored at all; the user
        // file supplies the concrete backend model name.
        if let Some(target) = user.aliases.get(alias) {
            let target = target.trim();
            if !target.is_empty() {
                alias_to_model.insert(alias.clone(), target.to_string());
            }
        }
        if let RawAliasEntry::Detailed {
            promise: Some(promise),
        } = entry
        {
            promises.insert(alias.clone(), promise.clone());
        }
    }

    let mut debug_logging = DebugLogging::default();
    for (key, enabled) in &user.debug_logging {
        match key.as_str() {
            "request_headers" => debug_logging.request_headers = *enabled,
            "request_body" => debug_logging.request_body = *enabled,
            "response_headers" => debug_logging.response_headers = *enabled,
            "response_body" => debug_logging.response_body = *enabled,
            other => log::debug!("Ignoring unknown debug_logging key '{other}'"),
        }
    }

    // The user file may override (not merge with) the tool-calling set, but
    // only with a non-empty list.
    let tool_calling_capable_models = match &user.tool_calling_capable_models {
        Some(models) if !models.is_empty() => collect_model_set(models),
        _ => collect_model_set(&base.tool_calling_capable_models),
    };

    let ollama_timeout_seconds = user
        .ollama_timeout_seconds
        .filter(|seconds| *seconds > 0.0);

    Ok(RoutingConfig {
        alias_to_model,
        default_alias: base.default_alias,
        promises,
        debug_logging,
        thinking_capable_models: collect_model_set(&base.thinking_capable_models),
        tool_calling_capable_models,
        verbose_tool_logging: user.verbose_tool_logging.unwrap_or(base.verbose_tool_logging),
        tool_call_streaming_enabled: user
            .tool_call_streaming_enabled
            .unwrap_or(base.tool_call_streaming_enabled),
        ollama_timeout_seconds,
    })
}

/// Alias lookup with unconditional fallback: unknown model names pass
/// through untranslated rather than failing.
pub fn resolve_model(requested: &str, config: &RoutingConfig) -> String {
    config
        .alias_to_model
        .get(requested)
        .cloned()
        .unwrap_or_else(|| requested.to_string())
}
