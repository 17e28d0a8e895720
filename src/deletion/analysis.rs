// ABOUTME: Joins the layer graph with usage evidence into a deletion analysis.
// ABOUTME: Splits images into used and unused and prices the unused batch exactly.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::layers::LayerGraph;
use crate::types::{ImageId, OperationId};
use crate::usage::{EvidenceBundle, UsageReason, check_tags_against_records};

/// Operator choices for a deletion run.
#[derive(Debug, Clone, Default)]
pub struct DeletionOptions {
    /// Actually delete. Off means dry run.
    pub apply: bool,
    /// Skip the interactive confirmation.
    pub force: bool,
    /// Only activity newer than this many days keeps a tag alive.
    pub unused_since_days: Option<u32>,
    /// Namespaces the checkpoint of this run.
    pub operation_id: Option<OperationId>,
    /// Restrict the run to tags with one of these prefixes.
    pub tag_prefixes: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageStatus {
    Used,
    Unused,
}

/// Per-image figures for the report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageStats {
    pub image: ImageId,
    pub repository: String,
    /// Bytes freed if this image alone were deleted.
    pub size: u64,
    /// Sum of all the image's layers.
    pub total_size: u64,
    pub status: ImageStatus,
    pub reason: UsageReason,
    pub evidence: String,
    pub most_recent_use: Option<DateTime<Utc>>,
}

/// Result of one analysis pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeletionAnalysis {
    pub used_images: BTreeSet<ImageId>,
    pub unused_images: BTreeSet<ImageId>,
    /// Bytes freed by deleting every unused image together.
    pub total_size_saved: u64,
    pub stats: BTreeMap<ImageId, ImageStats>,
}

impl DeletionAnalysis {
    pub fn compute(
        graph: &LayerGraph,
        evidence: &EvidenceBundle,
        options: &DeletionOptions,
        now: DateTime<Utc>,
    ) -> Self {
        let images: Vec<_> = graph
            .images()
            .filter(|image| {
                options.tag_prefixes.is_empty()
                    || options
                        .tag_prefixes
                        .iter()
                        .any(|p| image.tag().starts_with(p.as_str()))
            })
            .collect();

        let records = evidence.records();
        let verdict = check_tags_against_records(
            images.iter().map(|image| image.tag()),
            &records,
            options.unused_since_days,
            now,
        );

        let mut analysis = DeletionAnalysis::default();
        for image in images {
            let (reason, summary, most_recent) = match verdict.usage(image.tag()) {
                Some(usage) => (usage.reason, usage.summary.clone(), usage.most_recent),
                None => (UsageReason::Unreferenced, String::new(), None),
            };
            let status = if reason.in_use() {
                analysis.used_images.insert(image.id.clone());
                ImageStatus::Used
            } else {
                analysis.unused_images.insert(image.id.clone());
                ImageStatus::Unused
            };

            analysis.stats.insert(
                image.id.clone(),
                ImageStats {
                    image: image.id.clone(),
                    repository: image.repository.clone(),
                    size: graph.freed_space_for(&image.id),
                    total_size: graph.image_total_size(&image.id),
                    status,
                    reason,
                    evidence: summary,
                    most_recent_use: most_recent,
                },
            );
        }

        analysis.total_size_saved = graph.freed_space_if_deleted(&analysis.unused_images);
        tracing::info!(
            "analysis: {} used, {} unused, {} bytes reclaimable",
            analysis.used_images.len(),
            analysis.unused_images.len(),
            analysis.total_size_saved
        );
        analysis
    }

    pub fn total_images(&self) -> usize {
        self.used_images.len() + self.unused_images.len()
    }

    /// Repository and tag for an item string, if it names an analyzed image.
    pub fn resolve(&self, item: &str) -> Option<(String, String)> {
        let id = ImageId::parse(item).ok()?;
        let stats = self.stats.get(&id)?;
        if stats.repository.is_empty() {
            return None;
        }
        Some((stats.repository.clone(), id.tag().to_string()))
    }
}
