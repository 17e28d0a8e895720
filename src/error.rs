// ABOUTME: Application-wide error types for regsweep.
// ABOUTME: Wraps subsystem errors so commands can bubble them up with `?`.

use std::path::PathBuf;
use thiserror::Error;

use crate::checkpoint::CheckpointError;
use crate::deletion::DeletionError;
use crate::jobs::JobError;
use crate::registry::RegistryError;
use crate::types::{OperationNameError, ParseImageIdError};
use crate::usage::EvidenceError;

#[derive(Debug, Error)]
pub enum Error {
    #[error("file already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("configuration file not found in {0}")]
    ConfigNotFound(PathBuf),

    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("no checkpoint found for {0}")]
    CheckpointNotFound(String),

    #[error("deletion not confirmed")]
    NotConfirmed,

    #[error("{0} deletions failed; rerun to retry them")]
    DeletionsFailed(usize),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Evidence(#[from] EvidenceError),

    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),

    #[error(transparent)]
    Deletion(#[from] DeletionError),

    #[error(transparent)]
    Job(#[from] JobError),

    #[error(transparent)]
    ImageId(#[from] ParseImageIdError),

    #[error(transparent)]
    OperationName(#[from] OperationNameError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
