//! Temporary photo storage scoped to one application attempt.
//!
//! Every downloaded photo lands under a single temp root; cleanup only ever
//! deletes files it can prove live inside that root. A path that resolves
//! outside the root is logged and skipped, never deleted.

use crate::errors::{error_logging, AppError, AppResult};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

/// Filesystem store for per-attempt photo downloads
pub struct TempPhotoStore {
    root: PathBuf,
}

impl TempPhotoStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create the temp root if it does not exist yet
    pub fn ensure_root(&self) -> AppResult<()> {
        fs::create_dir_all(&self.root).map_err(|e| {
            AppError::FileSystem(format!(
                "Could not create temp photo directory {}: {e}",
                self.root.display()
            ))
        })
    }

    /// Write downloaded photo bytes under the temp root.
    ///
    /// The filename carries the user id, a timestamp and the sequence index
    /// so concurrent attempts never collide.
    pub fn save_photo(&self, bytes: &[u8], user_id: u64, sequence: usize) -> AppResult<PathBuf> {
        self.ensure_root()?;

        let timestamp = chrono::Utc::now().timestamp();
        let filename = format!("{user_id}_{timestamp}_{sequence}.jpg");
        let path = self.root.join(filename);

        fs::write(&path, bytes).map_err(|e| {
            AppError::FileSystem(format!("Could not write photo {}: {e}", path.display()))
        })?;

        debug!(user_id, path = %path.display(), size = bytes.len(), "Saved temp photo");
        Ok(path)
    }

    /// Delete the given photo files.
    ///
    /// Paths outside the temp root are logged and skipped. Missing files are
    /// skipped quietly. Deletion failures are logged, never raised: cleanup
    /// runs on every attempt-termination path and must not interrupt it.
    pub fn cleanup(&self, paths: &[PathBuf]) {
        for path in paths {
            if !path.exists() {
                debug!(path = %path.display(), "Temp photo already gone, skipping");
                continue;
            }

            if !self.is_within_root(path) {
                error!(
                    path = %path.display(),
                    root = %self.root.display(),
                    "Refusing to delete file outside the temp photo directory"
                );
                continue;
            }

            match fs::remove_file(path) {
                Ok(()) => info!(path = %path.display(), "Cleaned up temp photo"),
                Err(e) => error_logging::log_filesystem_error(
                    &e,
                    "cleanup_temp_photo",
                    Some(&path.display().to_string()),
                ),
            }
        }
    }

    /// Remove a single stray file, e.g. a photo saved for a session that was
    /// torn down while the download was in flight
    pub fn discard(&self, path: &Path) {
        self.cleanup(std::slice::from_ref(&path.to_path_buf()));
    }

    /// Canonical-path containment check against the temp root
    fn is_within_root(&self, path: &Path) -> bool {
        let Ok(canonical_root) = self.root.canonicalize() else {
            return false;
        };
        let Ok(canonical_path) = path.canonicalize() else {
            return false;
        };
        canonical_path.starts_with(&canonical_root)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}
