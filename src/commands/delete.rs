// ABOUTME: Delete command implementation.
// ABOUTME: Runs the deletion state machine: analyze, report, then dry run or confirmed apply.

use super::scan::{
    connect_registry, evidence_path, report_warnings, scan_registry, selected_repositories,
};
use crate::cli::Selection;
use regsweep::checkpoint::{CheckpointError, CheckpointManager};
use regsweep::config::Config;
use regsweep::deletion::{
    DELETE_OPERATION, Deletion, DeletionOptions, DeletionOutcome, ItemStatus, StdinConfirm,
    human_size,
};
use regsweep::diagnostics::{Diagnostics, Warning};
use regsweep::error::{Error, Result};
use regsweep::output::Output;
use regsweep::registry::check_reachable;
use regsweep::types::{OperationId, OperationType};
use regsweep::usage::EvidenceBundle;

pub struct DeleteArgs {
    pub selection: Selection,
    pub apply: bool,
    pub force: bool,
    pub operation_id: Option<String>,
}

pub async fn delete(config: Config, args: DeleteArgs, mut output: Output) -> Result<()> {
    let DeleteArgs {
        selection,
        apply,
        force,
        operation_id,
    } = args;
    let operation_id = operation_id.as_deref().map(OperationId::new).transpose()?;

    // Without evidence every tag looks unused, so a missing or unreadable
    // bundle stops the run before the registry is touched.
    let evidence_path = evidence_path(&config, &selection).ok_or_else(|| {
        Error::InvalidConfig(
            "no evidence bundle given; pass --evidence or set `evidence` in the config".to_string(),
        )
    })?;
    let evidence = EvidenceBundle::load(&evidence_path)?;
    tracing::debug!(
        "loaded {} evidence documents from {}",
        evidence.total_documents(),
        evidence_path.display()
    );

    output.start_timer();
    let mut diag = Diagnostics::default();
    let (registry, limiter) = connect_registry(&config)?;

    output.progress(&format!(
        "{} unused tags in {}",
        if apply { "Deleting" } else { "Dry run: finding" },
        config.registry.url
    ));
    let graph = scan_registry(&registry, &config, &selection, &output, &mut diag).await?;

    let options = DeletionOptions {
        apply,
        force,
        unused_since_days: selection.unused_since_days,
        operation_id: operation_id.clone(),
        tag_prefixes: selection.tag_prefixes.clone(),
    };
    let reported = Deletion::analyze(&graph, &evidence, options).report(&config.reports_dir)?;
    output.progress(&format!(
        "  → Report written to {}",
        reported.report_path().display()
    ));

    let outcome = if apply {
        let checkpoints = CheckpointManager::new(&config.checkpoint_dir)?;
        let operation = OperationType::new(DELETE_OPERATION)?;
        match checkpoints.try_load(&operation, operation_id.as_ref()) {
            Err(e @ CheckpointError::Corrupt { .. }) => {
                diag.warn(Warning::checkpoint_corrupt(format!(
                    "starting over: {}",
                    e
                )));
            }
            Err(e) => return Err(e.into()),
            Ok(_) => {}
        }

        let repositories: Vec<String> = selected_repositories(&config, &selection)?
            .into_iter()
            .map(|(_, repository)| repository)
            .collect();
        let reachable = check_reachable(registry.inner(), &repositories).await?;
        output.progress(&format!(
            "  → Registry reachable ({} tags in {})",
            reachable.tag_count, reachable.repository
        ));

        let confirmed = reported
            .confirm(&StdinConfirm, force)
            .map_err(|_| Error::NotConfirmed)?;
        confirmed
            .apply(&registry, &checkpoints, &config.retry, &limiter)
            .await?
            .finish()
    } else {
        reported.finish_dry_run()
    };

    print_outcome(&outcome, &output);
    report_warnings(&diag, &output);
    output.data("deletion complete", &outcome);

    if outcome.has_failures() {
        return Err(Error::DeletionsFailed(outcome.failed()));
    }
    output.success(&format!(
        "{}: {} ({})",
        if apply { "Deleted" } else { "Would delete" },
        if apply {
            outcome.deleted()
        } else {
            outcome.candidates
        },
        human_size(outcome.total_size_saved)
    ));
    Ok(())
}

fn print_outcome(outcome: &DeletionOutcome, output: &Output) {
    if outcome.already_processed > 0 {
        output.progress(&format!(
            "  → {} items already processed by an earlier run",
            outcome.already_processed
        ));
    }
    for item in &outcome.items {
        let line = match (item.status, &item.error) {
            (ItemStatus::WouldDelete, _) => format!("  would delete {}", item.item),
            (ItemStatus::Deleted, _) => format!("  ✓ deleted {}", item.item),
            (ItemStatus::Failed, Some(error)) => format!("  ✗ {}: {}", item.item, error),
            (ItemStatus::Failed, None) => format!("  ✗ {}", item.item),
            (ItemStatus::Skipped, _) => format!("  - skipped {}", item.item),
        };
        output.progress(&line);
    }
}
