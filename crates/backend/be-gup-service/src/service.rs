//! Core GUP service logic

use std::path::PathBuf;

use anyhow::Result;
use tracing::{debug, info, instrument};

use crate::{
    artifact::ArtifactTemplate,
    config::GupConfig,
    decision::UpdateDecision,
    error::GupError,
    store::VersionStore,
    types::{ForceUpdate, GupResponse, PublishForm, UpdateRecord},
    version::VersionFormat,
};

/// Application state shared by every request
#[derive(Debug)]
pub struct AppState {
    pub config: GupConfig,
    pub store: VersionStore,
}

impl AppState {
    #[instrument(skip_all, fields(data_dir = %config.data_dir.display()))]
    pub fn new(config: GupConfig) -> Result<Self> {
        let template = ArtifactTemplate::new(&config.artifact_template)?;
        let format = VersionFormat::new(config.version_segments)?;
        let store = VersionStore::new(
            config.record_path(),
            config.data_dir.clone(),
            template,
            format,
        );

        debug!(
            "Version store ready: record={}, template={}, segments={}",
            store.record_path().display(),
            config.artifact_template,
            config.version_segments
        );
        Ok(Self { config, store })
    }

    /// Compares the client's version with the published one.
    #[instrument(skip(self))]
    pub async fn check_version(&self, client_version: &str) -> Result<GupResponse, GupError> {
        let client = self.store.format().parse(client_version)?;
        let record = self.store.load().await?;

        let decision = UpdateDecision::evaluate(&record.version, &client, record.force_update);
        info!(
            "Version check: server={}, client={}, need_update={}, need_force_update={}",
            record.version, client, decision.need_update, decision.need_force_update
        );

        Ok(GupResponse {
            need_update: decision.need_update,
            need_force_update: decision.need_force_update,
            version: record.version.to_string(),
            location: self.config.download_url.clone(),
        })
    }

    /// Path and file name of the installer for the published version.
    #[instrument(skip(self))]
    pub async fn current_installer(&self) -> Result<(PathBuf, String), GupError> {
        let record = self.store.load().await?;
        let path = self.store.artifact_path(&record.version);

        if !self.store.artifact_exists(&record.version).await {
            return Err(GupError::InstallerNotFound(path.display().to_string()));
        }

        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        debug!("Serving installer {}", path.display());
        Ok((path, file_name))
    }

    /// Validates a publish request, stores an uploaded installer if one was
    /// sent, then records the new version.
    #[instrument(skip_all, fields(version = ?form.version, force_update = ?form.force_update))]
    pub async fn publish(&self, form: PublishForm) -> Result<UpdateRecord, GupError> {
        let raw_version = form
            .version
            .ok_or_else(|| GupError::MissingField(self.config.version_field.clone()))?;
        let version = self.store.format().parse(&raw_version)?;

        let force_update = match form.force_update.as_deref() {
            Some(flag) => flag.parse::<ForceUpdate>()?,
            None => ForceUpdate::No,
        };

        if let Some(installer) = form.installer {
            self.store.commit_artifact(installer, &version).await?;
        }

        self.store.save(&version, force_update).await?;

        Ok(UpdateRecord {
            version,
            force_update,
        })
    }
}
