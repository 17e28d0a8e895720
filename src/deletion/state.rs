// ABOUTME: Deletion workflow state markers for the type state pattern.
// ABOUTME: A deletion can only be applied after it was reported and confirmed.

use std::path::PathBuf;

use super::DeletionOutcome;

/// Analysis done: used and unused images are known.
/// Available actions: `report()`
#[derive(Debug, Clone, Copy, Default)]
pub struct Analyzed;

/// Report written.
/// Available actions: `finish_dry_run()`, `confirm()`
#[derive(Debug, Clone)]
pub struct Reported {
    pub(crate) report_path: PathBuf,
}

/// Operator opted in and confirmed.
/// Available actions: `apply()`
#[derive(Debug, Clone)]
pub struct Confirmed {
    pub(crate) report_path: PathBuf,
}

/// Deletions attempted.
/// Available actions: `finish()`
#[derive(Debug, Clone)]
pub struct Applied {
    pub(crate) outcome: DeletionOutcome,
}
