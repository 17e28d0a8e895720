// ABOUTME: Generic deletion workflow struct parameterized by state.
// ABOUTME: Analysis and options travel with every state.

use chrono::{DateTime, Utc};

use super::analysis::{DeletionAnalysis, DeletionOptions};
use super::state::{Analyzed, Applied};
use super::DeletionOutcome;
use crate::layers::LayerGraph;
use crate::usage::EvidenceBundle;

/// A deletion run, parameterized by its current state.
///
/// Dry run is the default path: `analyze` then `report` then
/// `finish_dry_run`. Mutating the registry additionally requires `confirm`,
/// which only succeeds when the options opt in to applying.
#[derive(Debug)]
pub struct Deletion<S> {
    pub(crate) graph: LayerGraph,
    pub(crate) analysis: DeletionAnalysis,
    pub(crate) options: DeletionOptions,
    pub(crate) state: S,
}

impl Deletion<Analyzed> {
    /// Classify every image in `graph` against `evidence`.
    pub fn analyze(graph: &LayerGraph, evidence: &EvidenceBundle, options: DeletionOptions) -> Self {
        Self::analyze_at(graph, evidence, options, Utc::now())
    }

    /// Like [`Deletion::analyze`] with an explicit clock.
    pub fn analyze_at(
        graph: &LayerGraph,
        evidence: &EvidenceBundle,
        options: DeletionOptions,
        now: DateTime<Utc>,
    ) -> Self {
        Deletion {
            graph: graph.clone(),
            analysis: DeletionAnalysis::compute(graph, evidence, &options, now),
            options,
            state: Analyzed,
        }
    }
}

impl<S> Deletion<S> {
    pub fn analysis(&self) -> &DeletionAnalysis {
        &self.analysis
    }

    pub fn options(&self) -> &DeletionOptions {
        &self.options
    }
}

impl Deletion<Applied> {
    pub fn outcome(&self) -> &DeletionOutcome {
        &self.state.outcome
    }

    pub fn finish(self) -> DeletionOutcome {
        self.state.outcome
    }
}
