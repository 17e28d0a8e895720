// ABOUTME: File-backed checkpoint store, one JSON file per operation key.
// ABOUTME: Saves merge with what is on disk and land atomically via rename.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::Utc;

use super::{Checkpoint, CheckpointError, CheckpointUpdate};
use crate::types::{OperationId, OperationType};

const SUFFIX: &str = ".checkpoint.json";

/// Stores checkpoints under a single directory.
///
/// Concurrent writers to the same operation key are not supported; callers
/// serialize them. Different operation types never share a file.
#[derive(Debug, Clone)]
pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    /// Open a store rooted at `dir`, creating the directory if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, CheckpointError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| CheckpointError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `<dir>/<type>.checkpoint.json` or `<dir>/<type>.<id>.checkpoint.json`.
    ///
    /// Operation types never contain `.`, so the first `.` always ends the type.
    pub fn path(&self, operation_type: &OperationType, operation_id: Option<&OperationId>) -> PathBuf {
        let name = match operation_id {
            Some(id) => format!("{}.{}{}", operation_type, id, SUFFIX),
            None => format!("{}{}", operation_type, SUFFIX),
        };
        self.dir.join(name)
    }

    /// Merge `update` into the stored checkpoint (or start a new one) and
    /// write it out. Returns the file path.
    pub fn save(&self, update: CheckpointUpdate) -> Result<PathBuf, CheckpointError> {
        let path = self.path(&update.operation_type, update.operation_id.as_ref());
        let now = Utc::now();

        let checkpoint = match self.load_path(&path) {
            Some(mut existing) => {
                existing.merge(update, now);
                existing
            }
            None => Checkpoint::from_update(update, now),
        };

        let json = serde_json::to_vec_pretty(&checkpoint)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|source| CheckpointError::Io {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, &path).map_err(|source| CheckpointError::Io {
            path: path.clone(),
            source,
        })?;

        tracing::debug!("checkpoint saved: {}", path.display());
        Ok(path)
    }

    /// Load a checkpoint, surfacing read and parse failures.
    pub fn try_load(
        &self,
        operation_type: &OperationType,
        operation_id: Option<&OperationId>,
    ) -> Result<Option<Checkpoint>, CheckpointError> {
        read_checkpoint(&self.path(operation_type, operation_id))
    }

    /// Load a checkpoint. A missing, unreadable, or malformed file is `None`;
    /// the latter two are logged.
    pub fn load(
        &self,
        operation_type: &OperationType,
        operation_id: Option<&OperationId>,
    ) -> Option<Checkpoint> {
        self.load_path(&self.path(operation_type, operation_id))
    }

    fn load_path(&self, path: &Path) -> Option<Checkpoint> {
        match read_checkpoint(path) {
            Ok(checkpoint) => checkpoint,
            Err(e) => {
                tracing::warn!("ignoring unusable checkpoint: {}", e);
                None
            }
        }
    }

    /// Items from `all_items` not yet completed, failed, or skipped.
    /// Without a checkpoint this is `all_items` unchanged.
    pub fn remaining_items(
        &self,
        operation_type: &OperationType,
        all_items: &[String],
        operation_id: Option<&OperationId>,
    ) -> Vec<String> {
        match self.load(operation_type, operation_id) {
            Some(checkpoint) => checkpoint.remaining(all_items),
            None => all_items.to_vec(),
        }
    }

    /// True iff a checkpoint exists and has unprocessed items.
    pub fn is_resumable(
        &self,
        operation_type: &OperationType,
        operation_id: Option<&OperationId>,
    ) -> bool {
        self.load(operation_type, operation_id)
            .is_some_and(|checkpoint| !checkpoint.is_complete())
    }

    /// Remove a checkpoint file. `Ok(false)` if there was none.
    pub fn delete(
        &self,
        operation_type: &OperationType,
        operation_id: Option<&OperationId>,
    ) -> Result<bool, CheckpointError> {
        let path = self.path(operation_type, operation_id);
        match fs::remove_file(&path) {
            Ok(()) => {
                tracing::info!("deleted checkpoint: {}", path.display());
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(CheckpointError::Io { path, source }),
        }
    }

    /// Checkpoint files in the store, optionally limited to one operation type.
    pub fn list(
        &self,
        operation_type: Option<&OperationType>,
    ) -> Result<Vec<PathBuf>, CheckpointError> {
        let entries = fs::read_dir(&self.dir).map_err(|source| CheckpointError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| CheckpointError::Io {
                path: self.dir.clone(),
                source,
            })?;
            let name = entry.file_name();
            let Some(stem) = name.to_str().and_then(|n| n.strip_suffix(SUFFIX)) else {
                continue;
            };
            let stem_type = stem.split_once('.').map_or(stem, |(ty, _)| ty);
            let wanted = operation_type.is_none_or(|op| stem_type == op.as_str());
            if wanted {
                paths.push(entry.path());
            }
        }
        paths.sort();
        Ok(paths)
    }
}

/// Read a checkpoint file directly; `Ok(None)` if it does not exist.
pub fn read_checkpoint(path: &Path) -> Result<Option<Checkpoint>, CheckpointError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(CheckpointError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    serde_json::from_str(&content)
        .map(Some)
        .map_err(|source| CheckpointError::Corrupt {
            path: path.to_path_buf(),
            source,
        })
}
