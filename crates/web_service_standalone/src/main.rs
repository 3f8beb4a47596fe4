use std::path::PathBuf;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use gateway_routing::Settings;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_line_number(true)
                .with_file(false),
        )
        .init();

    let settings = Settings::new();
    let port = settings.proxy_port();

    // Config files live next to the working directory of the deployment.
    let repo_root = PathBuf::from(".");
    if let Err(e) = web_service::server::run(repo_root, port).await {
        tracing::error!("Failed to run gateway: {e}");
        std::process::exit(1);
    }
}
