//! Warm boot snapshot of the LAG registry.
//!
//! The snapshot is written atomically: serialize to a temporary file in the
//! target directory, fsync it, then rename over the old snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::error::LagError;
use crate::registry::LagRegistry;
use crate::types::LagGroup;

/// Current snapshot format version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Errors reading or writing a snapshot.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("Snapshot I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt snapshot {path}: {message}")]
    Corrupt { path: PathBuf, message: String },

    #[error("Unsupported snapshot version {found} in {path} (expected {expected})")]
    Version {
        path: PathBuf,
        found: u32,
        expected: u32,
    },
}

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotFile {
    version: u32,
    saved_at: DateTime<Utc>,
    lags: Vec<LagGroup>,
}

/// Snapshot file handle.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_err(&self, source: std::io::Error) -> SnapshotError {
        SnapshotError::Io {
            path: self.path.clone(),
            source,
        }
    }

    /// Writes all groups of the registry to the snapshot file.
    pub fn save(&self, registry: &LagRegistry) -> Result<(), SnapshotError> {
        let snapshot = SnapshotFile {
            version: SNAPSHOT_VERSION,
            saved_at: Utc::now(),
            lags: registry.groups(),
        };
        let content = serde_json::to_vec_pretty(&snapshot).map_err(|e| SnapshotError::Corrupt {
            path: self.path.clone(),
            message: e.to_string(),
        })?;

        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).map_err(|e| self.io_err(e))?;

        let mut tmp_name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_else(|| "lag_snapshot.json".into());
        tmp_name.push(".tmp");
        let tmp_path = dir.join(tmp_name);

        let mut file = File::create(&tmp_path).map_err(|e| self.io_err(e))?;
        file.write_all(&content).map_err(|e| self.io_err(e))?;
        file.sync_all().map_err(|e| self.io_err(e))?;
        drop(file);

        if let Err(e) = fs::rename(&tmp_path, &self.path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(self.io_err(e));
        }

        info!(
            path = %self.path.display(),
            lags = registry.lag_count(),
            members = registry.member_count(),
            "Saved LAG snapshot"
        );
        Ok(())
    }

    /// Loads and validates the snapshot.
    ///
    /// Returns `Ok(None)` when no snapshot file exists.
    pub fn load(&self) -> Result<Option<LagRegistry>, SnapshotError> {
        let content = match fs::read(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %self.path.display(), "No LAG snapshot found");
                return Ok(None);
            }
            Err(e) => return Err(self.io_err(e)),
        };

        let snapshot: SnapshotFile =
            serde_json::from_slice(&content).map_err(|e| SnapshotError::Corrupt {
                path: self.path.clone(),
                message: e.to_string(),
            })?;

        if snapshot.version != SNAPSHOT_VERSION {
            return Err(SnapshotError::Version {
                path: self.path.clone(),
                found: snapshot.version,
                expected: SNAPSHOT_VERSION,
            });
        }

        debug!(saved_at = %snapshot.saved_at, "Validating LAG snapshot");
        let registry =
            LagRegistry::from_groups(snapshot.lags).map_err(|e: LagError| SnapshotError::Corrupt {
                path: self.path.clone(),
                message: e.to_string(),
            })?;

        info!(
            path = %self.path.display(),
            lags = registry.lag_count(),
            members = registry.member_count(),
            "Loaded LAG snapshot"
        );
        Ok(Some(registry))
    }
}
