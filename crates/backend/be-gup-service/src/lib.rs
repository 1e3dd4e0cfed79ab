//! GUP Update Service
//!
//! A Generic Update Protocol style update server. Clients poll `/params` with
//! their installed version and receive a `<GUP>` document telling them whether
//! to update, `/setup` serves the installer of the published version, and
//! operators publish a new version through a multipart `POST /update`.
//!
//! The published version lives in a two-line record file next to the
//! installers; a version is only recorded once its installer is on disk.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, info};

pub mod artifact;
pub mod config;
pub mod decision;
pub mod error;
pub mod handlers;
pub mod service;
pub mod store;
pub mod types;
pub mod version;
pub mod xml;

use service::AppState;

/// Create the axum router
pub fn create_router(state: Arc<AppState>) -> Router {
    let max_upload_bytes = state.config.max_upload_bytes;

    Router::new()
        .route("/params", get(handlers::check_version_handler))
        .route("/setup", get(handlers::fetch_installer_handler))
        .route("/update", post(handlers::publish_update_handler))
        .route("/health", get(handlers::health_handler))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

/// Initialize the GUP service and return the router
pub async fn init_gup_service(config: GupConfig) -> Result<Router> {
    debug!("Initializing GUP service in {}", config.data_dir.display());

    let state = Arc::new(AppState::new(config).context("Failed to create application state")?);

    if let Some(record) = state
        .store
        .seed_from_artifacts()
        .await
        .context("Failed to seed version record from installers")?
    {
        info!(
            "Seeded version record with {} from installers on disk",
            record.version
        );
    }

    Ok(create_router(state))
}

// Re-export commonly used types
pub use config::GupConfig;
pub use decision::UpdateDecision;
pub use error::{ErrorResponse, GupError};
pub use store::VersionStore;
pub use types::{ForceUpdate, GupResponse, UpdateRecord};
pub use version::{Version, VersionFormat, compare};
