// ABOUTME: Analyze command implementation.
// ABOUTME: Reports layer sharing and, given evidence, what a deletion would reclaim.

use super::scan::{connect_registry, evidence_path, load_evidence, report_warnings, scan_registry};
use crate::cli::Selection;
use regsweep::config::Config;
use regsweep::deletion::{DeletionAnalysis, DeletionOptions, human_size};
use regsweep::diagnostics::Diagnostics;
use regsweep::error::Result;
use regsweep::output::Output;
use serde::Serialize;

#[derive(Serialize)]
struct AnalyzeResult {
    layers: regsweep::layers::LayerSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    usage: Option<UsageResult>,
}

#[derive(Serialize)]
struct UsageResult {
    used_images: usize,
    unused_images: usize,
    reclaimable_bytes: u64,
}

pub async fn analyze(config: Config, selection: Selection, mut output: Output) -> Result<()> {
    output.start_timer();
    let mut diag = Diagnostics::default();
    let (registry, _limiter) = connect_registry(&config)?;

    output.progress(&format!("Analyzing registry {}", config.registry.url));
    let graph = scan_registry(&registry, &config, &selection, &output, &mut diag).await?;
    let summary = graph.summary();

    output.line(&format!(
        "Images: {}  Layers: {}  Stored: {}",
        summary.total_images,
        summary.total_layers,
        human_size(summary.total_size_bytes)
    ));
    output.line(&format!(
        "Single-use layers: {} ({})  Shared layers: {} ({})",
        summary.single_use_layers,
        human_size(summary.single_use_size_bytes),
        summary.shared_layers,
        human_size(summary.shared_size_bytes)
    ));
    output.line(&format!(
        "Average layers per image: {:.1}  Average references per layer: {:.2}",
        summary.avg_layers_per_image, summary.avg_ref_count
    ));

    let usage = match evidence_path(&config, &selection) {
        Some(path) => {
            let evidence = load_evidence(&path, &mut diag);
            let options = DeletionOptions {
                unused_since_days: selection.unused_since_days,
                tag_prefixes: selection.tag_prefixes.clone(),
                ..DeletionOptions::default()
            };
            let analysis =
                DeletionAnalysis::compute(&graph, &evidence, &options, chrono::Utc::now());
            output.line(&format!(
                "In use: {}  Unused: {}  Reclaimable: {}",
                analysis.used_images.len(),
                analysis.unused_images.len(),
                human_size(analysis.total_size_saved)
            ));
            Some(UsageResult {
                used_images: analysis.used_images.len(),
                unused_images: analysis.unused_images.len(),
                reclaimable_bytes: analysis.total_size_saved,
            })
        }
        None => {
            output.progress("No evidence given; skipping usage detection");
            None
        }
    };

    report_warnings(&diag, &output);
    output.data(
        "analysis complete",
        &AnalyzeResult {
            layers: summary,
            usage,
        },
    );
    output.success("Analysis complete");
    Ok(())
}
