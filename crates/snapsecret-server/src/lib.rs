pub mod clock;
pub mod error;
pub mod handlers;
pub mod ids;
pub mod lifecycle;
pub mod server;
pub mod store;
pub mod upload;
pub mod validation;

/// Shared application state threaded through axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: lifecycle::Lifecycle,
}

pub use error::{SecretError, ValidationError};
pub use lifecycle::{Lifecycle, PayloadView};
pub use server::{build_router, resolve_data_dir, run, ServerConfig};
