// ABOUTME: Entry point for the regsweep CLI application.
// ABOUTME: Parses arguments, sets up logging, and dispatches to command handlers.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use regsweep::config::{self, Config};
use regsweep::error::Result;
use regsweep::output::{Output, OutputMode};
use std::env;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // RUST_LOG wins over the verbose flag when set.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("warn")
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let mode = if cli.json {
        OutputMode::Json
    } else if cli.quiet {
        OutputMode::Quiet
    } else {
        OutputMode::Normal
    };

    if let Err(e) = run(cli, mode).await {
        Output::new(mode).error(&e.to_string());
        std::process::exit(1);
    }
}

async fn run(cli: Cli, mode: OutputMode) -> Result<()> {
    let cwd = env::current_dir()?;
    let output = Output::new(mode);
    let Cli {
        config: config_path,
        command,
        ..
    } = cli;

    let load_config = || match &config_path {
        Some(path) => Config::load(path),
        None => Config::discover(&cwd),
    };

    match command {
        Commands::Init {
            registry,
            image_types,
            force,
        } => {
            config::init_config(&cwd, registry.as_deref(), &image_types, force)?;
            output.success(&format!("Created {}", config::CONFIG_FILENAME));
            Ok(())
        }
        Commands::Analyze { selection } => commands::analyze(load_config()?, selection, output).await,
        Commands::Delete {
            selection,
            apply,
            force,
            operation_id,
        } => {
            let args = commands::DeleteArgs {
                selection,
                apply,
                force,
                operation_id,
            };
            commands::delete(load_config()?, args, output).await
        }
        Commands::Checkpoints { command } => commands::checkpoints(load_config()?, command, output),
    }
}
