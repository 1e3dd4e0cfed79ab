//! Persistence of the current version record and installer lookup

use std::path::{Path, PathBuf};

use tempfile::{Builder as TempFileBuilder, TempPath};
use tokio::{fs, io::AsyncWriteExt, sync::RwLock};
use tracing::{debug, info, instrument, warn};

use crate::{
    artifact::ArtifactTemplate,
    error::GupError,
    types::{ForceUpdate, UpdateRecord},
    version::{Version, VersionFormat},
};

/// Two-line record file (version, then `yes`/`no`) next to the installers it
/// advertises.
#[derive(Debug)]
pub struct VersionStore {
    record_path: PathBuf,
    artifact_dir: PathBuf,
    template: ArtifactTemplate,
    format: VersionFormat,
    // Orders saves and installer commits against loads within this process.
    lock: RwLock<()>,
}

/// An installer upload written to a temporary file in the installer
/// directory. Dropping it without `VersionStore::commit_artifact` removes the
/// file.
#[derive(Debug)]
pub struct PendingArtifact {
    file: fs::File,
    path: TempPath,
    size: u64,
}

impl PendingArtifact {
    pub async fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), GupError> {
        self.file
            .write_all(chunk)
            .await
            .map_err(|e| write_error(&self.path, e))?;
        self.size += chunk.len() as u64;
        Ok(())
    }

    pub fn size(&self) -> u64 {
        self.size
    }
}

impl VersionStore {
    pub fn new(
        record_path: PathBuf,
        artifact_dir: PathBuf,
        template: ArtifactTemplate,
        format: VersionFormat,
    ) -> Self {
        Self {
            record_path,
            artifact_dir,
            template,
            format,
            lock: RwLock::new(()),
        }
    }

    pub fn format(&self) -> VersionFormat {
        self.format
    }

    pub fn record_path(&self) -> &Path {
        &self.record_path
    }

    pub fn artifact_path(&self, version: &Version) -> PathBuf {
        self.artifact_dir.join(self.template.file_name(version))
    }

    /// Reads the current record. Any failure, including malformed content,
    /// is a `StorageRead` error so callers never compare against garbage.
    #[instrument(skip(self), fields(path = %self.record_path.display()))]
    pub async fn load(&self) -> Result<UpdateRecord, GupError> {
        let _guard = self.lock.read().await;

        let content = fs::read_to_string(&self.record_path)
            .await
            .map_err(|e| self.read_error(e.to_string()))?;

        let mut lines = content.lines().map(str::trim);
        let version_line = lines
            .next()
            .filter(|line| !line.is_empty())
            .ok_or_else(|| self.read_error("record is empty".to_string()))?;
        let flag_line = lines
            .next()
            .ok_or_else(|| self.read_error("record has no force update line".to_string()))?;

        if lines.any(|line| !line.is_empty()) {
            return Err(self.read_error("record has more than two lines".to_string()));
        }

        let version = self
            .format
            .parse(version_line)
            .map_err(|e| self.read_error(e.to_string()))?;
        let force_update = flag_line
            .parse::<ForceUpdate>()
            .map_err(|e| self.read_error(e.to_string()))?;

        debug!("Loaded record: version={}, force={}", version, force_update);
        Ok(UpdateRecord {
            version,
            force_update,
        })
    }

    /// True when the installer for `version` is a regular file that can be
    /// opened.
    pub async fn artifact_exists(&self, version: &Version) -> bool {
        let path = self.artifact_path(version);
        match fs::metadata(&path).await {
            Ok(metadata) if metadata.is_file() => fs::File::open(&path).await.is_ok(),
            Ok(_) => false,
            Err(e) => {
                debug!("Installer {} unavailable: {}", path.display(), e);
                false
            }
        }
    }

    /// Replaces the record. Rejected unless the installer for `version` is
    /// already on disk.
    #[instrument(skip(self))]
    pub async fn save(&self, version: &Version, force_update: ForceUpdate) -> Result<(), GupError> {
        let _guard = self.lock.write().await;

        if !self.artifact_exists(version).await {
            return Err(GupError::ArtifactMissing {
                version: version.to_string(),
                path: self.artifact_path(version).display().to_string(),
            });
        }

        let content = format!("{}\n{}\n", version, force_update);
        write_replacing(&self.record_path, content.as_bytes()).await?;

        info!("Current version set to {} (force update: {})", version, force_update);
        Ok(())
    }

    /// Opens a temporary file for an installer whose version is not known yet.
    pub fn begin_artifact(&self) -> Result<PendingArtifact, GupError> {
        let (file, path) = create_temp_file(&self.artifact_dir)?;
        Ok(PendingArtifact {
            file,
            path,
            size: 0,
        })
    }

    /// Moves a finished upload to the file name derived from `version`.
    #[instrument(skip(self, pending), fields(size = pending.size))]
    pub async fn commit_artifact(
        &self,
        pending: PendingArtifact,
        version: &Version,
    ) -> Result<PathBuf, GupError> {
        let PendingArtifact { file, path: tmp, .. } = pending;
        sync_file(file, &tmp).await?;

        let path = self.artifact_path(version);
        let _guard = self.lock.write().await;
        tmp.persist(&path).map_err(|e| write_error(&path, e.error))?;

        info!("Stored installer {}", path.display());
        Ok(path)
    }

    /// Writes an in-memory installer to the file name derived from `version`.
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    pub async fn store_artifact(&self, version: &Version, bytes: &[u8]) -> Result<PathBuf, GupError> {
        let mut pending = self.begin_artifact()?;
        pending.write_chunk(bytes).await?;
        self.commit_artifact(pending, version).await
    }

    /// Creates the record from the newest installer on disk when no record
    /// exists yet. Returns the record that was written, if any.
    ///
    /// Installers whose versions compare equal (`1.01.0`, `1.1.0`) resolve to
    /// the lexicographically smallest file name.
    #[instrument(skip(self), fields(dir = %self.artifact_dir.display()))]
    pub async fn seed_from_artifacts(&self) -> Result<Option<UpdateRecord>, GupError> {
        if fs::try_exists(&self.record_path)
            .await
            .map_err(|e| self.read_error(e.to_string()))?
        {
            debug!("Record already present, skipping seed");
            return Ok(None);
        }

        let mut entries = match fs::read_dir(&self.artifact_dir).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(
                    "Cannot scan installer directory {}: {}",
                    self.artifact_dir.display(),
                    e
                );
                return Ok(None);
            }
        };

        let mut newest: Option<Version> = None;
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    warn!("Stopped scanning installer directory: {}", e);
                    break;
                }
            };

            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };
            let Some(version) = self
                .template
                .version_of(file_name)
                .and_then(|raw| self.format.parse(raw).ok())
            else {
                continue;
            };

            debug!("Found installer {} for version {}", file_name, version);
            let replaces = newest.as_ref().is_none_or(|current| {
                version > *current
                    || (version == *current && version.as_str() < current.as_str())
            });
            if replaces {
                newest = Some(version);
            }
        }

        let Some(version) = newest else {
            info!("No installers found, record left empty");
            return Ok(None);
        };

        self.save(&version, ForceUpdate::No).await?;
        Ok(Some(UpdateRecord {
            version,
            force_update: ForceUpdate::No,
        }))
    }

    fn read_error(&self, reason: String) -> GupError {
        GupError::StorageRead {
            path: self.record_path.display().to_string(),
            reason,
        }
    }
}

fn write_error(path: &Path, e: std::io::Error) -> GupError {
    GupError::StorageWrite {
        path: path.display().to_string(),
        reason: e.to_string(),
    }
}

/// Creates a uniquely named hidden temp file in `dir`; it is removed when the
/// returned `TempPath` is dropped.
fn create_temp_file(dir: &Path) -> Result<(fs::File, TempPath), GupError> {
    let dir = if dir.as_os_str().is_empty() {
        Path::new(".")
    } else {
        dir
    };

    let tmp = TempFileBuilder::new()
        .prefix(".gup-")
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(|e| write_error(dir, e))?;
    let (file, path) = tmp.into_parts();
    Ok((fs::File::from_std(file), path))
}

async fn sync_file(mut file: fs::File, path: &Path) -> Result<(), GupError> {
    file.flush().await.map_err(|e| write_error(path, e))?;
    file.sync_all().await.map_err(|e| write_error(path, e))
}

/// Writes to a unique sibling temp file then renames it over `path`, so
/// readers see either the old or the new content.
async fn write_replacing(path: &Path, bytes: &[u8]) -> Result<(), GupError> {
    let dir = path.parent().unwrap_or(Path::new("."));
    let (mut file, tmp) = create_temp_file(dir)?;

    file.write_all(bytes)
        .await
        .map_err(|e| write_error(path, e))?;
    sync_file(file, &tmp).await?;

    tmp.persist(path).map_err(|e| write_error(path, e.error))?;
    Ok(())
}
