pub mod catalog;
pub mod client;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod params;
pub mod progress;
pub mod prompt;
pub mod redis;
pub mod service;
pub mod session;
pub mod storage;
pub mod transport;

use std::sync::Arc;

use crate::config::Config;
use crate::handlers::AppState;
use crate::service::ChatService;
use crate::transport::{OpenAiTransport, Transport, UpstreamError};

/// Build the relay state. Without an API key the service still starts and
/// answers chat requests with a configuration error.
pub fn build_state(config: Arc<Config>) -> Result<AppState, UpstreamError> {
    let transport = match config.openai.api_key.clone() {
        Some(key) => {
            let transport =
                OpenAiTransport::new(key, Some(config.openai.base_url.clone()))?;
            Some(Arc::new(transport) as Arc<dyn Transport>)
        }
        None => {
            tracing::warn!("OPENAI_API_KEY is not set; chat requests will fail");
            None
        }
    };
    Ok(AppState::new(ChatService::new(transport), config))
}

/// Subscriber shared by the binaries: stderr, no ANSI, `RUST_LOG` or `info`
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(false)
        .with_writer(std::io::stderr)
        .init();
}
