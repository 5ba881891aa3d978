use std::time::Duration;

use deckscore::{load_config_or_default, DeckService};
use deckscore_server::{config_path, logging, router, AppState, StartupError};

/// How long running jobs may take to finish after Ctrl-C.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<(), StartupError> {
    let path = config_path();
    let config = load_config_or_default(&path)?;

    logging::init(config.log_format)?;
    tracing::info!("Starting deckscore server v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Configuration: {}", path.display());
    tracing::info!("  - Upload directory: {}", config.upload_directory);
    tracing::info!("  - Max concurrent jobs: {}", config.max_concurrent_jobs);
    tracing::info!("  - Model: {}", config.ai.model);

    let service = DeckService::from_config(&config)?;
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let app = router(AppState::new(service.clone(), config));

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| StartupError::Bind {
            addr: addr.clone(),
            source: e,
        })?;
    tracing::info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(StartupError::Serve)?;

    tracing::info!("HTTP server stopped, waiting for running jobs");
    if tokio::time::timeout(SHUTDOWN_GRACE, service.shutdown())
        .await
        .is_err()
    {
        tracing::warn!(
            "Jobs still running after {}s, exiting anyway",
            SHUTDOWN_GRACE.as_secs()
        );
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
