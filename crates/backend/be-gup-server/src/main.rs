use be_gup_server::{LogConfig, ServerConfig, init_tracing, run_server};
use be_gup_service::GupConfig;
use dotenv::dotenv;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    // --- Tracing ---
    let log_config = LogConfig::from_env()?;
    let _log_guard = init_tracing(&log_config)?;

    // --- Shutdown channel ---
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(());
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("Received CTRL+C, initiating shutdown..."),
            Err(e) => {
                tracing::error!("Failed to listen for CTRL+C: {}", e);
                std::future::pending::<()>().await;
            }
        }
        let _ = shutdown_tx.send(());
    });

    // --- Server config from environment ---
    let config = ServerConfig {
        gup: GupConfig::from_env()?,
        shutdown: shutdown_rx,
    };

    run_server(config).await
}
