pub mod controllers;
pub mod error;
pub mod middleware;
pub mod server;

pub use error::{AppError, Result};
pub use server::AppState;
