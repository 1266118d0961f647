use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;

use study_fast::config::Config;
use study_fast::handlers::router;
use study_fast::{build_state, init_tracing};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = Arc::new(Config::load());
    let bind: SocketAddr = config
        .server
        .bind
        .parse()
        .with_context(|| format!("Invalid server bind address '{}' (expected host:port)", config.server.bind))?;

    let state = build_state(config.clone()).context("Failed to build OpenAI transport")?;
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("Failed to bind {bind}"))?;
    tracing::info!(
        %bind,
        environment = %config.server.environment,
        api_key = config.api_key_configured(),
        "Starting {} chat relay",
        config.server.name
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received");
        })
        .await?;
    Ok(())
}
