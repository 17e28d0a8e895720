// ABOUTME: Resumable progress tracking for long batch operations.
// ABOUTME: Checkpoint records, the merge rule, and the file-backed manager.

mod manager;
mod record;

use std::path::PathBuf;

pub use manager::{CheckpointManager, read_checkpoint};
pub use record::{Checkpoint, CheckpointUpdate, ItemState};

/// Errors from checkpoint persistence.
#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    #[error("checkpoint I/O failed for {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("checkpoint {} is corrupt: {source}", .path.display())]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("failed to serialize checkpoint: {0}")]
    Serialize(#[from] serde_json::Error),
}
