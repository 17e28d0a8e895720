// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines all subcommands and their arguments.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "regsweep")]
#[command(about = "Find and delete container image tags nothing uses anymore")]
#[command(version)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only print final results
    #[arg(short, long, global = true, conflicts_with = "json")]
    pub quiet: bool,

    /// Print JSON lines instead of text
    #[arg(long, global = true)]
    pub json: bool,

    /// Configuration file (default: discovered from the working directory)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new regsweep.yml configuration file
    Init {
        /// Registry host to put in the template
        #[arg(long)]
        registry: Option<String>,

        /// Image type to sweep (repeatable)
        #[arg(long = "image-type")]
        image_types: Vec<String>,

        /// Overwrite an existing configuration file
        #[arg(short, long)]
        force: bool,
    },

    /// Report layer sharing and reclaimable space without deleting anything
    Analyze {
        #[command(flatten)]
        selection: Selection,
    },

    /// Delete unused tags (dry run unless --apply is given)
    Delete {
        #[command(flatten)]
        selection: Selection,

        /// Actually delete; without this only a report is written
        #[arg(long)]
        apply: bool,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        force: bool,

        /// Resume key for the checkpoint; runs with different ids never share progress
        #[arg(long)]
        operation_id: Option<String>,
    },

    /// Inspect or clear saved progress of interrupted operations
    Checkpoints {
        #[command(subcommand)]
        command: CheckpointCommands,
    },
}

/// Which images to look at and how to judge them.
#[derive(Args, Debug, Clone, Default)]
pub struct Selection {
    /// Limit to these image types (repeatable; default: all configured)
    #[arg(long = "image-type")]
    pub image_types: Vec<String>,

    /// Only consider tags starting with this prefix (repeatable)
    #[arg(long = "tag-prefix")]
    pub tag_prefixes: Vec<String>,

    /// Usage evidence bundle (JSON)
    #[arg(short, long)]
    pub evidence: Option<PathBuf>,

    /// Treat activity older than this many days as stale
    #[arg(long)]
    pub unused_since_days: Option<u32>,
}

#[derive(Subcommand)]
pub enum CheckpointCommands {
    /// List checkpoint files
    List {
        /// Only show checkpoints of this operation type
        #[arg(long)]
        operation_type: Option<String>,
    },

    /// Show one checkpoint
    Show {
        operation_type: String,

        #[arg(long)]
        operation_id: Option<String>,
    },

    /// Delete one checkpoint
    Clear {
        operation_type: String,

        #[arg(long)]
        operation_id: Option<String>,
    },
}
