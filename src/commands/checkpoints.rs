// ABOUTME: Checkpoints command implementation.
// ABOUTME: Lists, shows, and clears saved progress of interrupted operations.

use crate::cli::CheckpointCommands;
use regsweep::checkpoint::{CheckpointManager, read_checkpoint};
use regsweep::config::Config;
use regsweep::diagnostics::{Diagnostics, Warning};
use regsweep::error::{Error, Result};
use regsweep::output::Output;
use regsweep::types::{OperationId, OperationType};

pub fn checkpoints(config: Config, command: CheckpointCommands, output: Output) -> Result<()> {
    let manager = CheckpointManager::new(&config.checkpoint_dir)?;
    match command {
        CheckpointCommands::List { operation_type } => {
            let operation_type = operation_type.as_deref().map(OperationType::new).transpose()?;
            list(&manager, operation_type.as_ref(), &output)
        }
        CheckpointCommands::Show {
            operation_type,
            operation_id,
        } => {
            let operation_type = OperationType::new(&operation_type)?;
            let operation_id = operation_id.as_deref().map(OperationId::new).transpose()?;
            show(&manager, &operation_type, operation_id.as_ref(), &output)
        }
        CheckpointCommands::Clear {
            operation_type,
            operation_id,
        } => {
            let operation_type = OperationType::new(&operation_type)?;
            let operation_id = operation_id.as_deref().map(OperationId::new).transpose()?;
            let path = manager.path(&operation_type, operation_id.as_ref());
            if manager.delete(&operation_type, operation_id.as_ref())? {
                output.success(&format!("Removed {}", path.display()));
                Ok(())
            } else {
                Err(Error::CheckpointNotFound(path.display().to_string()))
            }
        }
    }
}

fn list(
    manager: &CheckpointManager,
    operation_type: Option<&OperationType>,
    output: &Output,
) -> Result<()> {
    let mut diag = Diagnostics::default();
    let mut rows = Vec::new();
    for path in manager.list(operation_type)? {
        match read_checkpoint(&path) {
            Ok(Some(checkpoint)) => {
                output.line(&format!(
                    "{}  {}/{} processed ({} failed)  updated {}",
                    path.display(),
                    checkpoint.processed(),
                    checkpoint.total_items,
                    checkpoint.failed_items.len(),
                    checkpoint.last_updated.format("%Y-%m-%d %H:%M:%S")
                ));
                rows.push(serde_json::json!({
                    "path": path,
                    "checkpoint": checkpoint,
                }));
            }
            Ok(None) => {}
            Err(e) => diag.warn(Warning::checkpoint_corrupt(e.to_string())),
        }
    }
    if rows.is_empty() {
        output.line("No checkpoints");
    }
    for warning in diag.warnings() {
        output.warning(&warning.message);
    }
    output.data("checkpoints", &rows);
    Ok(())
}

fn show(
    manager: &CheckpointManager,
    operation_type: &OperationType,
    operation_id: Option<&OperationId>,
    output: &Output,
) -> Result<()> {
    let path = manager.path(operation_type, operation_id);
    let checkpoint = manager
        .try_load(operation_type, operation_id)?
        .ok_or_else(|| Error::CheckpointNotFound(path.display().to_string()))?;

    output.line(&format!("Operation:  {}", checkpoint.operation_type));
    output.line(&format!("Started:    {}", checkpoint.started_at));
    output.line(&format!("Updated:    {}", checkpoint.last_updated));
    output.line(&format!(
        "Progress:   {}/{}{}",
        checkpoint.processed(),
        checkpoint.total_items,
        if checkpoint.is_complete() { " (complete)" } else { "" }
    ));
    output.line(&format!("Completed:  {}", checkpoint.completed_items.len()));
    output.line(&format!("Skipped:    {}", checkpoint.skipped_items.len()));
    output.line(&format!("Failed:     {}", checkpoint.failed_items.len()));
    for item in &checkpoint.failed_items {
        output.line(&format!("  ✗ {}", item));
    }
    output.data("checkpoint", &checkpoint);
    Ok(())
}
