//! Approval engine HTTP server.

use approval_engine::{api, db, ApprovalEngine, EngineConfig};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Also installs the bridge that routes `log` records from the library.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = EngineConfig::load()?;
    let pool = db::initialize(&config.database_path).await?;
    let engine = Arc::new(ApprovalEngine::from_config(pool.clone(), &config)?);
    let app = api::router(engine, config.request_timeout());

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    log::info!("[server] Listening on http://{}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                log::error!("[server] Failed to listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await?;

    pool.close().await;
    log::info!("[server] Stopped");
    Ok(())
}
