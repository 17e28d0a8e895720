// ABOUTME: Background job tracking for long-running sweeps started from another process.
// ABOUTME: Spawn, inspect, stream logs from, and cancel child processes.

mod manager;
mod record;

pub use manager::JobManager;
pub use record::{CancelOutcome, JobRecord, JobStatus};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum JobError {
    #[error("job command is empty")]
    EmptyCommand,

    #[error("jobs can only be spawned from inside a tokio runtime")]
    NoRuntime,
}
