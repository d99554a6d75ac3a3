//! Hardlink materializer.
//!
//! Links completed download files into the media library layout. Every
//! failure is written back onto the file row before it is returned, so
//! operators can see why a file never showed up and re-trigger it.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::fs;
use tracing::{info, warn};

use crate::config::LibraryConfig;
use crate::metrics::HARDLINKS_TOTAL;
use crate::store::{FileStore, MediaFile, Source, StoreError};

use super::error::MaterializeError;
use super::path;

/// Materializes hardlinks for qualifying files and records the outcome.
pub struct Library {
    files: Arc<dyn FileStore>,
    config: LibraryConfig,
    download_dir: PathBuf,
}

impl Library {
    pub fn new(files: Arc<dyn FileStore>, config: LibraryConfig, download_dir: PathBuf) -> Self {
        Self {
            files,
            config,
            download_dir,
        }
    }

    /// Whether hardlinking is switched on at all.
    pub fn hardlink_enabled(&self) -> bool {
        self.config.hardlink_enabled
    }

    /// Hardlink `file` into the library. On success the file row gets the
    /// destination path and a completed status; on failure it gets the
    /// rendered error and a failed status.
    pub async fn materialize(
        &self,
        source: &Source,
        file: &MediaFile,
        force_overwrite: bool,
    ) -> Result<PathBuf, MaterializeError> {
        match self.try_materialize(source, file, force_overwrite).await {
            Ok(dest) => {
                self.files
                    .record_hardlink(file.id, &dest.to_string_lossy())?;
                HARDLINKS_TOTAL.with_label_values(&["success"]).inc();
                info!(file = %file.name, dest = %dest.display(), "hardlink created");
                Ok(dest)
            }
            Err(e) => {
                HARDLINKS_TOTAL.with_label_values(&["failed"]).inc();
                if let Err(store_err) = self.files.record_hardlink_failure(file.id, &e.to_string())
                {
                    warn!(
                        file_id = file.id,
                        error = %store_err,
                        "failed to record hardlink failure"
                    );
                }
                Err(e)
            }
        }
    }

    /// Re-run materialization for a stored file, typically after an
    /// operator fixed whatever made it fail.
    pub async fn rematerialize(
        &self,
        file_id: i64,
        force_overwrite: bool,
    ) -> Result<PathBuf, MaterializeError> {
        let details = self
            .files
            .file_details(file_id)?
            .ok_or(MaterializeError::Store(StoreError::FileNotFound(file_id)))?;

        self.materialize(&details.source, &details.file, force_overwrite)
            .await
    }

    async fn try_materialize(
        &self,
        source: &Source,
        file: &MediaFile,
        force_overwrite: bool,
    ) -> Result<PathBuf, MaterializeError> {
        // Titles become directory names; nothing may escape the root.
        if !path::is_safe_title(&source.title) {
            return Err(MaterializeError::UnsafeTitle {
                title: source.title.clone(),
            });
        }

        if !self.config.hardlink_enabled {
            return Err(MaterializeError::Disabled);
        }
        let root = self
            .config
            .output_dir
            .as_deref()
            .ok_or(MaterializeError::NoOutputRoot)?;

        let source_path = self.resolve_source_path(&file.path);
        if !source_path.exists() {
            return Err(MaterializeError::SourceMissing { path: source_path });
        }

        let dest = path::normalize(&path::build_dest_path(root, source, file)?);

        // A crafted file path could still point outside the root even
        // with a clean title.
        if !dest.starts_with(path::normalize(root)) {
            return Err(MaterializeError::OutsideRoot { path: dest });
        }

        if !force_overwrite {
            let conflicts = self
                .files
                .conflicting_hardlinks(&dest.to_string_lossy(), file.id)?;
            if !conflicts.is_empty() {
                let names = conflicts
                    .iter()
                    .map(|f| f.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", ");
                return Err(MaterializeError::Conflict { path: dest, names });
            }
        }

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                MaterializeError::DirectoryCreationFailed {
                    path: parent.to_path_buf(),
                    source: e,
                }
            })?;
        }

        // An existing destination is replaced unconditionally so that
        // re-materializing is idempotent.
        if dest.exists() {
            fs::remove_file(&dest)
                .await
                .map_err(|e| MaterializeError::LinkFailed {
                    source_path: source_path.clone(),
                    dest: dest.clone(),
                    source: e,
                })?;
        }

        fs::hard_link(&source_path, &dest)
            .await
            .map_err(|e| MaterializeError::LinkFailed {
                source_path: source_path.clone(),
                dest: dest.clone(),
                source: e,
            })?;

        Ok(dest)
    }

    fn resolve_source_path(&self, file_path: &str) -> PathBuf {
        let path = Path::new(file_path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.download_dir.join(path)
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
