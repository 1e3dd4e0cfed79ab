use std::{net::SocketAddr, path::PathBuf, str::FromStr};

use crate::error::GupError;

pub const DEFAULT_ARTIFACT_TEMPLATE: &str = "StageInstrument-{version}-x64-Setup.msi";

#[derive(Debug, Clone)]
pub struct GupConfig {
    pub http_addr: SocketAddr,
    /// Directory holding the record file and the installers.
    pub data_dir: PathBuf,
    pub record_file: PathBuf,
    pub artifact_template: String,
    /// Advertised in the `<Location>` element of version checks.
    pub download_url: String,
    pub version_segments: usize,
    pub version_field: String,
    pub force_field: String,
    pub installer_field: String,
    pub max_upload_bytes: usize,
}

impl Default for GupConfig {
    fn default() -> Self {
        Self {
            http_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            data_dir: PathBuf::from("."),
            record_file: PathBuf::from("localVersion.txt"),
            artifact_template: DEFAULT_ARTIFACT_TEMPLATE.to_string(),
            download_url: "http://127.0.0.1:8080/setup".to_string(),
            version_segments: 3,
            version_field: "Version".to_string(),
            force_field: "ForceUpdate".to_string(),
            installer_field: "Installer".to_string(),
            max_upload_bytes: 512 * 1024 * 1024,
        }
    }
}

impl GupConfig {
    pub fn from_env() -> Result<Self, GupError> {
        let defaults = Self::default();

        Ok(Self {
            http_addr: parse_var("GUP_HTTP_ADDR", defaults.http_addr)?,
            data_dir: std::env::var("GUP_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            record_file: std::env::var("GUP_RECORD_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.record_file),
            artifact_template: std::env::var("GUP_ARTIFACT_TEMPLATE")
                .unwrap_or(defaults.artifact_template),
            download_url: std::env::var("GUP_DOWNLOAD_URL").unwrap_or(defaults.download_url),
            version_segments: parse_var("GUP_VERSION_SEGMENTS", defaults.version_segments)?,
            version_field: std::env::var("GUP_VERSION_FIELD").unwrap_or(defaults.version_field),
            force_field: std::env::var("GUP_FORCE_FIELD").unwrap_or(defaults.force_field),
            installer_field: std::env::var("GUP_INSTALLER_FIELD")
                .unwrap_or(defaults.installer_field),
            max_upload_bytes: parse_var("GUP_MAX_UPLOAD_BYTES", defaults.max_upload_bytes)?,
        })
    }

    /// Record location; relative record paths live under `data_dir`.
    pub fn record_path(&self) -> PathBuf {
        self.data_dir.join(&self.record_file)
    }
}

fn parse_var<T>(key: &str, default: T) -> Result<T, GupError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(value) => value.trim().parse().map_err(|e| {
            GupError::Config(format!("{key} '{value}' is not valid: {e}"))
        }),
        Err(_) => Ok(default),
    }
}
