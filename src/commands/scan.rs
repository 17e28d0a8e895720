// ABOUTME: Shared setup for commands that read the registry.
// ABOUTME: Builds the skopeo client, scans the selected repositories, and loads evidence.

use crate::cli::Selection;
use regsweep::config::Config;
use regsweep::diagnostics::{Diagnostics, Warning};
use regsweep::error::{Error, Result};
use regsweep::layers::{AnalyzeOptions, LayerGraph, LayerGraphBuilder, analyze_repository};
use regsweep::output::Output;
use regsweep::registry::{CachedRegistry, RegistryClient, SkopeoRegistry};
use regsweep::retry::RateLimiter;
use regsweep::usage::EvidenceBundle;
use std::path::PathBuf;
use std::sync::Arc;

/// The registry client every command uses, plus the limiter shared with deletes.
pub fn connect_registry(
    config: &Config,
) -> Result<(CachedRegistry<SkopeoRegistry>, Arc<RateLimiter>)> {
    let limiter = Arc::new(RateLimiter::new(&config.rate_limit));
    let skopeo = SkopeoRegistry::new(config.skopeo_config()?, Arc::clone(&limiter));
    Ok((CachedRegistry::new(skopeo, &config.cache), limiter))
}

/// `(image_type, repository)` pairs selected on the command line.
pub fn selected_repositories(config: &Config, selection: &Selection) -> Result<Vec<(String, String)>> {
    let all = config.repositories();
    if selection.image_types.is_empty() {
        return Ok(all);
    }
    selection
        .image_types
        .iter()
        .map(|wanted| {
            all.iter()
                .find(|(image_type, _)| image_type == wanted)
                .cloned()
                .ok_or_else(|| {
                    Error::InvalidConfig(format!("image type '{}' is not configured", wanted))
                })
        })
        .collect()
}

/// Inspect every selected repository into one layer graph.
///
/// A repository whose tags cannot be listed is skipped with a warning, as
/// is every tag that cannot be inspected.
pub async fn scan_registry<R>(
    registry: &R,
    config: &Config,
    selection: &Selection,
    output: &Output,
    diag: &mut Diagnostics,
) -> Result<LayerGraph>
where
    R: RegistryClient + ?Sized,
{
    let options = AnalyzeOptions {
        workers: config.workers,
        tag_prefixes: selection.tag_prefixes.clone(),
        retry: config.retry.clone(),
    };

    let mut builder = LayerGraphBuilder::default();
    for (image_type, repository) in selected_repositories(config, selection)? {
        output.progress(&format!("  → Scanning {}...", repository));
        match analyze_repository(registry, &mut builder, &repository, &image_type, &options).await
        {
            Ok(scan) => {
                for (tag, error) in &scan.failures {
                    diag.warn(Warning::inspection_failed(format!(
                        "{}:{} could not be inspected: {}",
                        image_type, tag, error
                    )));
                }
                output.progress(&format!(
                    "    {} of {} tags inspected",
                    scan.inspected, scan.candidates
                ));
            }
            Err(e) => diag.warn(Warning::repository_skipped(format!(
                "skipping {}: {}",
                repository, e
            ))),
        }
    }

    Ok(builder.build())
}

/// Where the evidence comes from: the flag, else the config file.
pub fn evidence_path(config: &Config, selection: &Selection) -> Option<PathBuf> {
    selection
        .evidence
        .clone()
        .or_else(|| config.evidence.clone())
}

/// Load the evidence bundle for read-only reporting. An unreadable source
/// counts as no evidence.
pub fn load_evidence(path: &std::path::Path, diag: &mut Diagnostics) -> EvidenceBundle {
    match EvidenceBundle::load(path) {
        Ok(bundle) => {
            tracing::debug!(
                "loaded {} evidence documents from {}",
                bundle.total_documents(),
                path.display()
            );
            bundle
        }
        Err(e) => {
            diag.warn(Warning::evidence_source(format!(
                "evidence unavailable, treating as empty: {}",
                e
            )));
            EvidenceBundle::default()
        }
    }
}

/// Print collected warnings at the end of a command.
pub fn report_warnings(diag: &Diagnostics, output: &Output) {
    for warning in diag.warnings() {
        output.warning(&warning.message);
    }
}
