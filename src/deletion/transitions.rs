// ABOUTME: State transition methods for the deletion workflow.
// ABOUTME: Each method consumes self and returns the next state.

use std::path::Path;

use chrono::Utc;

use super::confirm::Confirm;
use super::error::DeletionError;
use super::outcome::{DeletionOutcome, ItemResult, ItemStatus, RunMode};
use super::report::{DeletionReport, human_size};
use super::state::{Analyzed, Applied, Confirmed, Reported};
use super::Deletion;
use crate::checkpoint::{CheckpointManager, CheckpointUpdate};
use crate::registry::RegistryClient;
use crate::retry::{RateLimiter, RetryPolicy};
use crate::types::{ImageId, OperationType};

/// Checkpoint namespace for tag deletions.
pub const DELETE_OPERATION: &str = "delete_unused_tags";

impl<S> Deletion<S> {
    fn transition<T>(self, state: T) -> Deletion<T> {
        Deletion {
            graph: self.graph,
            analysis: self.analysis,
            options: self.options,
            state,
        }
    }

    fn unused_items(&self) -> Vec<String> {
        self.analysis
            .unused_images
            .iter()
            .map(ToString::to_string)
            .collect()
    }
}

// =============================================================================
// Analyzed -> Reported
// =============================================================================

impl Deletion<Analyzed> {
    /// Write the deletion report under `reports_dir` and log its summary.
    ///
    /// # Errors
    ///
    /// Returns `DeletionError::WriteReport` if the report cannot be written.
    #[must_use = "deletion state must be used"]
    pub fn report(self, reports_dir: &Path) -> Result<Deletion<Reported>, DeletionError> {
        let report = DeletionReport::new(
            &self.analysis,
            !self.options.apply,
            self.options.unused_since_days,
            Utc::now(),
        );
        let report_path = report.write_to(reports_dir)?;

        tracing::info!("deletion report saved to {}", report_path.display());
        tracing::info!(
            "total images analyzed: {}, in use: {}, unused: {}, reclaimable: {}",
            report.summary.total_images_analyzed,
            report.summary.used_images,
            report.summary.unused_images,
            report.summary.total_size_saved_human
        );

        Ok(self.transition(Reported { report_path }))
    }
}

// =============================================================================
// Reported -> dry-run outcome | Confirmed
// =============================================================================

impl Deletion<Reported> {
    pub fn report_path(&self) -> &Path {
        &self.state.report_path
    }

    /// Stop without touching the registry.
    pub fn finish_dry_run(self) -> DeletionOutcome {
        let items: Vec<ItemResult> = self
            .unused_items()
            .into_iter()
            .map(|item| ItemResult::new(item, ItemStatus::WouldDelete))
            .collect();
        tracing::info!(
            "dry run: would delete {} images, saving {}",
            items.len(),
            human_size(self.analysis.total_size_saved)
        );

        DeletionOutcome {
            mode: RunMode::DryRun,
            report_path: self.state.report_path,
            candidates: items.len(),
            already_processed: 0,
            total_size_saved: self.analysis.total_size_saved,
            items,
        }
    }

    /// Gate the destructive step.
    ///
    /// Fails (handing back the reported deletion) unless the options opt in
    /// to applying and either `force` is set or `prompt` says yes.
    pub fn confirm(
        self,
        prompt: &dyn Confirm,
        force: bool,
    ) -> Result<Deletion<Confirmed>, Deletion<Reported>> {
        if !self.options.apply {
            return Err(self);
        }
        if force {
            tracing::warn!("force mode enabled, skipping confirmation prompt");
        } else {
            let question = format!(
                "About to delete {} images ({}) from the registry. This cannot be undone. Proceed?",
                self.analysis.unused_images.len(),
                human_size(self.analysis.total_size_saved)
            );
            if !prompt.confirm(&question) {
                tracing::info!("deletion declined by operator");
                return Err(self);
            }
        }
        let report_path = self.state.report_path.clone();
        Ok(self.transition(Confirmed { report_path }))
    }
}

// =============================================================================
// Confirmed -> Applied
// =============================================================================

impl Deletion<Confirmed> {
    /// Delete every unused image not already recorded in the checkpoint.
    ///
    /// Each delete waits on `limiter` and runs under `retry`. An item that
    /// still fails, or that the registry refuses, is recorded as failed and
    /// the batch continues. Items that no longer resolve to a repository are
    /// skipped. The checkpoint is saved after every item and removed once it
    /// holds no failures.
    ///
    /// # Errors
    ///
    /// Returns `DeletionError::Checkpoint` if progress cannot be persisted.
    #[must_use = "deletion state must be used"]
    pub async fn apply<R>(
        self,
        registry: &R,
        checkpoints: &CheckpointManager,
        retry: &RetryPolicy,
        limiter: &RateLimiter,
    ) -> Result<Deletion<Applied>, DeletionError>
    where
        R: RegistryClient + ?Sized,
    {
        let operation = OperationType::new(DELETE_OPERATION)?;
        let operation_id = self.options.operation_id.clone();
        let all_items = self.unused_items();
        let remaining =
            checkpoints.remaining_items(&operation, &all_items, operation_id.as_ref());
        let already_processed = all_items.len() - remaining.len();
        if already_processed > 0 {
            tracing::info!(
                "resuming: {} of {} items already processed",
                already_processed,
                all_items.len()
            );
        }

        let host = gethostname::gethostname().to_string_lossy().into_owned();
        let mut items = Vec::with_capacity(remaining.len());

        for item in remaining {
            let update = CheckpointUpdate::new(operation.clone(), all_items.len())
                .operation_id(operation_id.clone())
                .metadata("host", host.clone())
                .metadata("pid", std::process::id())
                .metadata("unused_since_days", self.options.unused_since_days);

            let (result, update) = match self.analysis.resolve(&item) {
                None => {
                    tracing::warn!("cannot resolve repository for {}, skipping", item);
                    (
                        ItemResult::new(&item, ItemStatus::Skipped)
                            .with_error("repository could not be resolved"),
                        update.skipped([item.clone()]),
                    )
                }
                Some((repository, tag)) => {
                    let outcome = retry
                        .retry(&format!("delete {}", item), || async {
                            limiter.acquire().await;
                            registry.delete(&repository, &tag).await
                        })
                        .await;
                    match outcome {
                        Ok(true) => {
                            tracing::info!("deleted {}", item);
                            (
                                ItemResult::new(&item, ItemStatus::Deleted),
                                update.completed([item.clone()]),
                            )
                        }
                        Ok(false) => {
                            tracing::warn!("registry did not delete {}", item);
                            (
                                ItemResult::new(&item, ItemStatus::Failed)
                                    .with_error("registry did not delete the tag"),
                                update.failed([item.clone()]),
                            )
                        }
                        Err(e) => {
                            tracing::error!("failed to delete {}: {}", item, e);
                            (
                                ItemResult::new(&item, ItemStatus::Failed).with_error(e.to_string()),
                                update.failed([item.clone()]),
                            )
                        }
                    }
                }
            };

            checkpoints.save(update)?;
            items.push(result);
        }

        let outstanding_failures = checkpoints
            .load(&operation, operation_id.as_ref())
            .map(|checkpoint| checkpoint.failed_items.len())
            .unwrap_or(0);
        if outstanding_failures == 0 {
            checkpoints.delete(&operation, operation_id.as_ref())?;
        } else {
            tracing::warn!(
                "{} failed items remain; checkpoint kept for review",
                outstanding_failures
            );
        }

        let deleted: Vec<ImageId> = items
            .iter()
            .filter(|i| i.status == ItemStatus::Deleted)
            .filter_map(|i| ImageId::parse(&i.item).ok())
            .collect();
        let outcome = DeletionOutcome {
            mode: RunMode::Apply,
            report_path: self.state.report_path.clone(),
            candidates: all_items.len(),
            already_processed,
            total_size_saved: self.graph.freed_space_if_deleted(&deleted),
            items,
        };
        tracing::info!(
            "deletion finished: {} deleted, {} failed, {} skipped",
            outcome.deleted(),
            outcome.failed(),
            outcome.skipped()
        );

        Ok(self.transition(Applied { outcome }))
    }
}
