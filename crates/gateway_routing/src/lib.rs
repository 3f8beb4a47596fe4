//! Routing configuration for the gateway
//!
//! Merges the base config file shipped with the gateway and the user's
//! override file into an immutable [`RoutingConfig`] snapshot, and resolves
//! client-facing model aliases to concrete backend model names.

pub mod config;
pub mod settings;

pub use config::{
    load_routing_config, resolve_model, ConfigPaths, DebugLogging, RoutingConfig, RoutingError,
};
pub use settings::{parse_timeout_seconds, Settings};
