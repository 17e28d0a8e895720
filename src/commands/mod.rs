// ABOUTME: Command module aggregator for the regsweep CLI.
// ABOUTME: Re-exports analyze, delete, and checkpoints command handlers.

mod analyze;
mod checkpoints;
mod delete;
mod scan;

pub use analyze::analyze;
pub use checkpoints::checkpoints;
pub use delete::{DeleteArgs, delete};
