pub mod auth;
pub mod tracing_middleware;

pub use auth::AuthMiddleware;
pub use tracing_middleware::TracingMiddleware;
