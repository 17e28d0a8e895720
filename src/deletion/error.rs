// ABOUTME: Deletion workflow errors with SNAFU pattern.
// ABOUTME: Wraps report, checkpoint, and naming failures for programmatic handling.

use std::path::PathBuf;

use snafu::Snafu;

use crate::checkpoint::CheckpointError;
use crate::types::OperationNameError;

/// Failures that stop the deletion workflow.
///
/// Per-item registry failures are not errors here; they are recorded in the
/// outcome and the batch continues.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum DeletionError {
    #[snafu(display("failed to write deletion report {}: {source}", path.display()))]
    WriteReport {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("failed to serialize deletion report: {source}"))]
    SerializeReport { source: serde_json::Error },

    #[snafu(display("checkpoint update failed: {source}"))]
    Checkpoint { source: CheckpointError },

    #[snafu(display("invalid operation name: {source}"))]
    OperationName { source: OperationNameError },
}

/// Error kind for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletionErrorKind {
    /// Report could not be produced.
    Report,
    /// Progress could not be persisted.
    Checkpoint,
    /// Bad operation type or id.
    Configuration,
}

impl DeletionError {
    /// Returns the error kind for programmatic handling.
    pub fn kind(&self) -> DeletionErrorKind {
        match self {
            DeletionError::WriteReport { .. } | DeletionError::SerializeReport { .. } => {
                DeletionErrorKind::Report
            }
            DeletionError::Checkpoint { .. } => DeletionErrorKind::Checkpoint,
            DeletionError::OperationName { .. } => DeletionErrorKind::Configuration,
        }
    }
}

impl From<CheckpointError> for DeletionError {
    fn from(source: CheckpointError) -> Self {
        DeletionError::Checkpoint { source }
    }
}

impl From<OperationNameError> for DeletionError {
    fn from(source: OperationNameError) -> Self {
        DeletionError::OperationName { source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_map_from_variants() {
        let err = DeletionError::from(OperationNameError::Empty);
        assert_eq!(err.kind(), DeletionErrorKind::Configuration);

        let err = DeletionError::WriteReport {
            path: PathBuf::from("/x"),
            source: std::io::Error::other("disk full"),
        };
        assert_eq!(err.kind(), DeletionErrorKind::Report);
        assert!(err.to_string().contains("/x"));
    }
}
