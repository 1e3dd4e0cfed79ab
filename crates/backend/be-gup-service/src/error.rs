use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use tracing::{error, warn};

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum GupError {
    #[error("Invalid version format: {0}")]
    InvalidVersion(String),

    #[error("Invalid force update flag: {0}")]
    InvalidForceFlag(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Failed to read version record {path}: {reason}")]
    StorageRead { path: String, reason: String },

    #[error("Failed to write {path}: {reason}")]
    StorageWrite { path: String, reason: String },

    #[error("No installer for version {version} at {path}")]
    ArtifactMissing { version: String, path: String },

    #[error("Installer not found: {0}")]
    InstallerNotFound(String),

    #[error("Malformed multipart request: {0}")]
    Multipart(String),

    #[error("Failed to render response document: {0}")]
    Xml(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl IntoResponse for GupError {
    fn into_response(self) -> Response {
        let (status, error_code, message, details) = match &self {
            GupError::InvalidVersion(v) => {
                warn!("Invalid version provided: {}", v);
                (
                    StatusCode::BAD_REQUEST,
                    "invalid_version",
                    "Invalid version format",
                    Some(format!("Version '{}' is not a dotted numeric version", v)),
                )
            }
            GupError::InvalidForceFlag(f) => {
                warn!("Invalid force update flag: {}", f);
                (
                    StatusCode::BAD_REQUEST,
                    "invalid_force_flag",
                    "Invalid force update flag",
                    Some(format!("Flag '{}' is not supported. Use 'yes' or 'no'", f)),
                )
            }
            GupError::MissingField(name) => {
                warn!("Missing required field: {}", name);
                (
                    StatusCode::BAD_REQUEST,
                    "missing_field",
                    "Missing required field",
                    Some(format!("Field '{}' must be provided", name)),
                )
            }
            GupError::StorageRead { path, reason } => {
                error!("Version record {} is unreadable: {}", path, reason);
                (
                    StatusCode::BAD_REQUEST,
                    "invalid_stored_version",
                    "Stored version is invalid",
                    None,
                )
            }
            GupError::StorageWrite { path, reason } => {
                error!("Failed to write {}: {}", path, reason);
                (
                    StatusCode::BAD_REQUEST,
                    "storage_write_failed",
                    "Failed to persist the update",
                    None,
                )
            }
            GupError::ArtifactMissing { version, path } => {
                warn!("Rejected publish of {}: missing installer {}", version, path);
                (
                    StatusCode::BAD_REQUEST,
                    "installer_missing",
                    "No installer exists for this version",
                    Some(format!("Upload the installer for version '{}' first", version)),
                )
            }
            GupError::InstallerNotFound(path) => {
                error!("Installer not found: {}", path);
                (
                    StatusCode::NOT_FOUND,
                    "installer_not_found",
                    "Installer package not found",
                    None,
                )
            }
            GupError::Multipart(e) => {
                warn!("Malformed multipart request: {}", e);
                (
                    StatusCode::BAD_REQUEST,
                    "malformed_multipart",
                    "Malformed multipart request",
                    Some(e.clone()),
                )
            }
            GupError::Xml(e) => {
                error!("Failed to render GUP document: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "render_failed",
                    "Failed to render response",
                    None,
                )
            }
            GupError::Config(e) => {
                error!("Configuration error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal server error",
                    None,
                )
            }
        };

        (
            status,
            Json(ErrorResponse {
                error: error_code.to_owned(),
                message: message.to_owned(),
                details,
            }),
        )
            .into_response()
    }
}
