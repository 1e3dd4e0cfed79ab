use std::path::PathBuf;

use anyhow::{Context, Result};
use be_gup_service::{GupConfig, init_gup_service};
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{Builder as RollingBuilder, Rotation},
};
use tracing_subscriber::{
    filter::{LevelFilter, Targets},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// Configuration for running the GUP server.
pub struct ServerConfig {
    pub gup: GupConfig,
    /// When this receiver gets a value, the server shuts down gracefully.
    pub shutdown: tokio::sync::watch::Receiver<()>,
}

/// Where logs go besides stdout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Directory for rolling log files; stdout only when unset.
    pub dir: Option<PathBuf>,
    pub max_files: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            dir: None,
            max_files: 10,
        }
    }
}

impl LogConfig {
    pub fn from_env() -> Result<Self> {
        let dir = std::env::var("GUP_LOG_DIR")
            .ok()
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);
        let max_files = match std::env::var("GUP_LOG_MAX_FILES") {
            Ok(value) => value
                .trim()
                .parse()
                .with_context(|| format!("Invalid GUP_LOG_MAX_FILES '{value}'"))?,
            Err(_) => Self::default().max_files,
        };

        Ok(Self { dir, max_files })
    }
}

/// Installs the global subscriber. The returned guard flushes the file
/// writer and must live until shutdown.
pub fn init_tracing(log: &LogConfig) -> Result<Option<WorkerGuard>> {
    let app_level = if cfg!(debug_assertions) {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    let global_filter = Targets::new()
        .with_default(LevelFilter::WARN)
        .with_target("be_gup", app_level)
        .with_target("tower_http", app_level)
        .with_target("hyper", LevelFilter::OFF)
        .with_target("tokio", LevelFilter::OFF);

    let (file_layer, guard) = match &log.dir {
        Some(dir) => {
            let appender = RollingBuilder::new()
                .rotation(Rotation::DAILY)
                .filename_prefix("gup-server")
                .filename_suffix("log")
                .max_log_files(log.max_files)
                .build(dir)
                .with_context(|| format!("Failed to open log directory {}", dir.display()))?;
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .with(global_filter)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(guard)
}

pub async fn run_server(config: ServerConfig) -> Result<()> {
    let http_addr = config.gup.http_addr;
    tracing::info!(
        "Serving installers from {} (record {})",
        config.gup.data_dir.display(),
        config.gup.record_path().display()
    );

    let router = init_gup_service(config.gup)
        .await
        .context("Failed to initialize GUP service")?;

    let mut shutdown = config.shutdown;
    let listener = tokio::net::TcpListener::bind(http_addr)
        .await
        .with_context(|| format!("Failed to bind {http_addr}"))?;
    tracing::info!("Starting HTTP server at {}", http_addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = shutdown.changed().await;
            tracing::info!("Shutting down HTTP server...");
        })
        .await
        .context("HTTP server error")?;

    Ok(())
}
