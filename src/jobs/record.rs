// ABOUTME: Job record snapshot, lifecycle status, and cancellation outcome.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::types::JobId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn is_active(self) -> bool {
        matches!(self, JobStatus::Pending | JobStatus::Running)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Point-in-time copy of a job.
#[derive(Debug, Clone, Serialize)]
pub struct JobRecord {
    pub id: JobId,
    pub program: String,
    pub args: Vec<String>,
    pub status: JobStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub exit_code: Option<i32>,
    pub pid: Option<u32>,
    /// Combined stdout and stderr lines, in arrival order.
    pub logs: Vec<String>,
}

/// Result of asking for a job to stop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelOutcome {
    /// The process was signalled and the job is now cancelled.
    Cancelled,
    /// There was nothing left to stop. If the job looked active when asked,
    /// its record is still marked cancelled.
    AlreadyFinished(JobStatus),
    /// The job is unknown or the signal could not be delivered.
    Error(String),
}
