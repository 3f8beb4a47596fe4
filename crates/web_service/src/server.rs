use std::{path::PathBuf, sync::Arc};

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use log::{error, info};

use crate::controllers::{messages_controller, system_controller};
use crate::middleware::{AuthMiddleware, TracingMiddleware};
use gateway_routing::{load_routing_config, ConfigPaths, Settings};
use ollama_client::{CapabilityCache, OllamaClient, OllamaClientTrait};

pub struct AppState {
    pub ollama_client: Arc<dyn OllamaClientTrait>,
    pub capability_cache: CapabilityCache,
    pub config_paths: ConfigPaths,
    pub auth_key: Option<String>,
}

const DEFAULT_WORKER_COUNT: usize = 10;

pub fn app_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/v1")
            .wrap(AuthMiddleware)
            .configure(messages_controller::config),
    )
    .configure(system_controller::config);
}

pub async fn run(repo_root: PathBuf, port: u16) -> std::io::Result<()> {
    info!("Starting gateway...");

    let settings = Settings::new();
    let config_paths = ConfigPaths::discover(&repo_root);

    // The config file may pin a timeout; the environment supplies the rest.
    let timeout_seconds = match load_routing_config(&config_paths) {
        Ok(config) => config
            .ollama_timeout_seconds
            .unwrap_or_else(|| settings.ollama_timeout_seconds()),
        Err(err) => {
            error!("Failed to load routing config at startup: {err}");
            settings.ollama_timeout_seconds()
        }
    };

    let base_url = settings.ollama_base_url();
    let ollama_client: Arc<dyn OllamaClientTrait> =
        Arc::new(OllamaClient::new(&base_url, timeout_seconds));

    let auth_key = settings.auth_key();
    if auth_key.is_none() {
        error!("CC_PROXY_AUTH_KEY is not set; all /v1 requests will be refused");
    }

    let app_state = web::Data::new(AppState {
        ollama_client,
        capability_cache: CapabilityCache::new(),
        config_paths,
        auth_key,
    });

    info!("Forwarding to Ollama at {base_url} (timeout {timeout_seconds}s)");

    let server = HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .wrap(Cors::permissive())
            .wrap(TracingMiddleware)
            .configure(app_config)
    })
    .workers(DEFAULT_WORKER_COUNT)
    .bind(("0.0.0.0", port))?
    .run();

    info!("Gateway listening on http://0.0.0.0:{port}");

    server.await
}
