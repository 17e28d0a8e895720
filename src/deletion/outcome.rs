// ABOUTME: Final result of a deletion run, per item and in aggregate.

use std::path::PathBuf;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    DryRun,
    Apply,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    WouldDelete,
    Deleted,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemResult {
    pub item: String,
    pub status: ItemStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ItemResult {
    pub fn new(item: impl Into<String>, status: ItemStatus) -> Self {
        Self {
            item: item.into(),
            status,
            error: None,
        }
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeletionOutcome {
    pub mode: RunMode,
    pub report_path: PathBuf,
    pub candidates: usize,
    /// Items skipped because an earlier run already processed them.
    pub already_processed: usize,
    pub total_size_saved: u64,
    pub items: Vec<ItemResult>,
}

impl DeletionOutcome {
    fn count(&self, status: ItemStatus) -> usize {
        self.items.iter().filter(|i| i.status == status).count()
    }

    pub fn deleted(&self) -> usize {
        self.count(ItemStatus::Deleted)
    }

    pub fn failed(&self) -> usize {
        self.count(ItemStatus::Failed)
    }

    pub fn skipped(&self) -> usize {
        self.count(ItemStatus::Skipped)
    }

    pub fn has_failures(&self) -> bool {
        self.failed() > 0
    }
}
