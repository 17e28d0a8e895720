// ABOUTME: Deletion coordinator using the type state pattern.
// ABOUTME: Analyze, report, then either stop as a dry run or confirm and apply with checkpoints.

mod analysis;
mod confirm;
mod error;
mod outcome;
mod report;
mod state;
mod transitions;
mod workflow;

pub use analysis::{DeletionAnalysis, DeletionOptions, ImageStats, ImageStatus};
pub use confirm::{Confirm, StdinConfirm};
pub use error::{DeletionError, DeletionErrorKind};
pub use outcome::{DeletionOutcome, ItemResult, ItemStatus, RunMode};
pub use report::{DeletionReport, ReportImage, ReportSummary, human_size};
pub use state::{Analyzed, Applied, Confirmed, Reported};
pub use transitions::DELETE_OPERATION;
pub use workflow::Deletion;
