// ABOUTME: Layer-accounting engine over content-addressed registry storage.
// ABOUTME: Snapshot graph of tags and shared layers plus the scan that fills it.

mod analyze;
mod graph;

pub use analyze::{
    AnalyzeOptions, BUILDCACHE_TAG, RepositoryScan, analyze_repository, filter_tags_by_prefix,
};
pub use graph::{ImageRecord, LayerGraph, LayerGraphBuilder, LayerIdx, LayerRecord, LayerSummary};
