pub mod backend;
pub mod chat;
pub mod google;

pub use backend::{Backend, BackendError};
pub use chat::ChatBackend;
pub use google::GoogleBackend;

use crate::config::{BackendConfig, ConfigError};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

/// Builds the backend selected by `config`
///
/// Credentials must already be resolved; a missing key fails here, before any request.
pub fn from_config(config: &BackendConfig) -> Result<Arc<dyn Backend>, ConfigError> {
    let backend: Arc<dyn Backend> = match config {
        BackendConfig::Google(cfg) => Arc::new(GoogleBackend::new(cfg)?),
        BackendConfig::LmStudio(cfg) => Arc::new(ChatBackend::lmstudio(cfg)?),
        BackendConfig::OpenRouter(cfg) => Arc::new(ChatBackend::openrouter(cfg)?),
    };

    ::log::info!("Using {} generation backend", backend.name());
    Ok(backend)
}

/// HTTP client shared by all requests of one backend
fn build_client(
    timeout_secs: Option<u64>,
    headers: reqwest::header::HeaderMap,
) -> Result<Client, ConfigError> {
    let mut builder = Client::builder().default_headers(headers);
    if let Some(secs) = timeout_secs {
        builder = builder.timeout(Duration::from_secs(secs));
    }
    Ok(builder.build()?)
}
