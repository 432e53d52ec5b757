use std::sync::Arc;

use imageprompt::{api, logging, AppState, Config};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    logging::init_tracing();

    let config = Config::from_env()?;
    let state = Arc::new(AppState::from_config(&config)?);

    info!(
        "captioning with {} (max {} retries)",
        state.captioner.model(),
        config.retry.max_retries
    );

    let app = api::create_router(state, &config);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    info!("listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
    }
    info!("shutting down");
}
