// ABOUTME: Persisted progress of one batch operation and the update merged into it.
// ABOUTME: Item sets stay disjoint; completed beats skipped beats failed.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::{OperationId, OperationType};

/// Where an item ended up in a checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemState {
    Completed,
    Failed,
    Skipped,
}

/// Progress record for one `(operation_type, operation_id)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub operation_type: OperationType,
    pub started_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    pub total_items: usize,
    #[serde(default)]
    pub completed_items: BTreeSet<String>,
    #[serde(default)]
    pub failed_items: BTreeSet<String>,
    #[serde(default)]
    pub skipped_items: BTreeSet<String>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl Checkpoint {
    /// Items recorded in any of the three sets.
    pub fn processed(&self) -> usize {
        self.completed_items.len() + self.failed_items.len() + self.skipped_items.len()
    }

    pub fn is_complete(&self) -> bool {
        self.processed() >= self.total_items
    }

    pub fn state_of(&self, item: &str) -> Option<ItemState> {
        if self.completed_items.contains(item) {
            Some(ItemState::Completed)
        } else if self.skipped_items.contains(item) {
            Some(ItemState::Skipped)
        } else if self.failed_items.contains(item) {
            Some(ItemState::Failed)
        } else {
            None
        }
    }

    /// Items from `all_items` not yet recorded, in their original order.
    pub fn remaining<'a, I>(&self, all_items: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a String>,
    {
        all_items
            .into_iter()
            .filter(|item| self.state_of(item).is_none())
            .cloned()
            .collect()
    }

    /// Fold `update` into this checkpoint.
    ///
    /// Sets are unioned, `started_at` is kept, metadata is shallow-merged with
    /// the update's keys winning, and `total_items` takes the update's value.
    pub(crate) fn merge(&mut self, update: CheckpointUpdate, now: DateTime<Utc>) {
        self.completed_items.extend(update.completed);
        self.skipped_items.extend(update.skipped);
        self.failed_items.extend(update.failed);
        self.metadata.extend(update.metadata);
        self.total_items = update.total_items;
        self.last_updated = now;
        self.normalize();
    }

    pub(crate) fn from_update(update: CheckpointUpdate, now: DateTime<Utc>) -> Self {
        let mut checkpoint = Checkpoint {
            operation_type: update.operation_type,
            started_at: now,
            last_updated: now,
            total_items: update.total_items,
            completed_items: update.completed.into_iter().collect(),
            failed_items: update.failed.into_iter().collect(),
            skipped_items: update.skipped.into_iter().collect(),
            metadata: update.metadata,
        };
        checkpoint.normalize();
        checkpoint
    }

    fn normalize(&mut self) {
        let completed = &self.completed_items;
        self.skipped_items.retain(|item| !completed.contains(item));
        let skipped = &self.skipped_items;
        self.failed_items
            .retain(|item| !completed.contains(item) && !skipped.contains(item));
    }
}

/// Progress to record for an operation.
#[derive(Debug, Clone)]
pub struct CheckpointUpdate {
    pub operation_type: OperationType,
    pub operation_id: Option<OperationId>,
    pub total_items: usize,
    pub completed: Vec<String>,
    pub failed: Vec<String>,
    pub skipped: Vec<String>,
    pub metadata: Map<String, Value>,
}

impl CheckpointUpdate {
    pub fn new(operation_type: OperationType, total_items: usize) -> Self {
        Self {
            operation_type,
            operation_id: None,
            total_items,
            completed: Vec::new(),
            failed: Vec::new(),
            skipped: Vec::new(),
            metadata: Map::new(),
        }
    }

    pub fn operation_id(mut self, id: Option<OperationId>) -> Self {
        self.operation_id = id;
        self
    }

    pub fn completed<I: IntoIterator<Item = String>>(mut self, items: I) -> Self {
        self.completed.extend(items);
        self
    }

    pub fn failed<I: IntoIterator<Item = String>>(mut self, items: I) -> Self {
        self.failed.extend(items);
        self
    }

    pub fn skipped<I: IntoIterator<Item = String>>(mut self, items: I) -> Self {
        self.skipped.extend(items);
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}
