// ABOUTME: Immutable snapshot of the tag-to-layer graph with reference counts.
// ABOUTME: Answers how many bytes deleting a set of tags would actually free.

use std::collections::{HashMap, HashSet};

use crate::registry::ImageInspection;
use crate::types::{ImageId, LayerDigest, ManifestDigest};

/// Index of a layer within a graph's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LayerIdx(usize);

/// A content-addressed blob and the number of distinct images listing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerRecord {
    pub digest: LayerDigest,
    pub size_bytes: u64,
    pub ref_count: usize,
}

/// One analyzed tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRecord {
    pub id: ImageId,
    pub repository: String,
    pub digest: ManifestDigest,
    /// Layers in manifest order. The position is the layer's order index.
    layers: Vec<LayerIdx>,
    /// Same layers, deduplicated.
    distinct: Vec<LayerIdx>,
}

impl ImageRecord {
    pub fn tag(&self) -> &str {
        self.id.tag()
    }

    /// Layer indices in manifest order.
    pub fn layer_order(&self) -> &[LayerIdx] {
        &self.layers
    }
}

/// Snapshot of every analyzed image and the layers they share.
///
/// Built once per analysis pass with [`LayerGraphBuilder`] and never mutated.
#[derive(Debug, Clone, Default)]
pub struct LayerGraph {
    layers: Vec<LayerRecord>,
    by_digest: HashMap<LayerDigest, LayerIdx>,
    images: Vec<ImageRecord>,
    by_image: HashMap<ImageId, usize>,
}

impl LayerGraph {
    pub fn builder() -> LayerGraphBuilder {
        LayerGraphBuilder::default()
    }

    pub fn image(&self, id: &ImageId) -> Option<&ImageRecord> {
        self.by_image.get(id).map(|&i| &self.images[i])
    }

    pub fn images(&self) -> impl Iterator<Item = &ImageRecord> {
        self.images.iter()
    }

    pub fn layer(&self, idx: LayerIdx) -> &LayerRecord {
        &self.layers[idx.0]
    }

    pub fn layer_by_digest(&self, digest: &LayerDigest) -> Option<&LayerRecord> {
        self.by_digest.get(digest).map(|&idx| self.layer(idx))
    }

    pub fn layers(&self) -> impl Iterator<Item = &LayerRecord> {
        self.layers.iter()
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// Bytes that become unreferenced if exactly these images are deleted together.
    ///
    /// A layer is counted iff every image in the snapshot that lists it is in
    /// the set. Unknown ids contribute nothing; duplicates and order are
    /// irrelevant. This is the authoritative figure for a batch: per-image
    /// results from [`freed_space_for`](Self::freed_space_for) do not add up
    /// to it when images share layers.
    pub fn freed_space_if_deleted<'a, I>(&self, image_ids: I) -> u64
    where
        I: IntoIterator<Item = &'a ImageId>,
    {
        let selected: HashSet<usize> = image_ids
            .into_iter()
            .filter_map(|id| self.by_image.get(id).copied())
            .collect();

        let mut deletion_count: HashMap<LayerIdx, usize> = HashMap::new();
        for &image in &selected {
            for &layer in &self.images[image].distinct {
                *deletion_count.entry(layer).or_insert(0) += 1;
            }
        }

        deletion_count
            .into_iter()
            .filter(|&(idx, count)| self.layer(idx).ref_count == count)
            .map(|(idx, _)| self.layer(idx).size_bytes)
            .sum()
    }

    /// Bytes freed by deleting this image alone.
    ///
    /// Not additive across images that share layers; use
    /// [`freed_space_if_deleted`](Self::freed_space_if_deleted) for a batch.
    pub fn freed_space_for(&self, image_id: &ImageId) -> u64 {
        self.freed_space_if_deleted(std::iter::once(image_id))
    }

    /// Sum of the image's distinct layer sizes, shared or not. Unknown ids give 0.
    pub fn image_total_size(&self, image_id: &ImageId) -> u64 {
        self.image(image_id)
            .map(|image| {
                image
                    .distinct
                    .iter()
                    .map(|&idx| self.layer(idx).size_bytes)
                    .sum()
            })
            .unwrap_or(0)
    }

    /// Images whose tag starts with `prefix`.
    pub fn images_with_tag_prefix<'a>(
        &'a self,
        prefix: &'a str,
    ) -> impl Iterator<Item = &'a ImageRecord> + 'a {
        self.images
            .iter()
            .filter(move |image| image.tag().starts_with(prefix))
    }

    /// Images whose tag is not in `used_tags`.
    pub fn images_not_in<'a>(
        &'a self,
        used_tags: &'a HashSet<String>,
    ) -> impl Iterator<Item = &'a ImageRecord> + 'a {
        self.images
            .iter()
            .filter(move |image| !used_tags.contains(image.tag()))
    }

    /// Aggregate statistics over the snapshot.
    pub fn summary(&self) -> LayerSummary {
        let mut summary = LayerSummary {
            total_images: self.images.len(),
            total_layers: self.layers.len(),
            ..LayerSummary::default()
        };

        let mut ref_total = 0usize;
        for layer in &self.layers {
            summary.total_size_bytes += layer.size_bytes;
            ref_total += layer.ref_count;
            if layer.ref_count > 1 {
                summary.shared_layers += 1;
                summary.shared_size_bytes += layer.size_bytes;
            } else {
                summary.single_use_layers += 1;
                summary.single_use_size_bytes += layer.size_bytes;
            }
        }

        let layer_refs: usize = self.images.iter().map(|i| i.layers.len()).sum();
        if summary.total_images > 0 {
            summary.avg_layers_per_image = layer_refs as f64 / summary.total_images as f64;
        }
        if summary.total_layers > 0 {
            summary.avg_ref_count = ref_total as f64 / summary.total_layers as f64;
        }
        summary
    }
}

/// Aggregate layer statistics for a snapshot.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct LayerSummary {
    pub total_images: usize,
    pub total_layers: usize,
    pub total_size_bytes: u64,
    pub single_use_layers: usize,
    pub single_use_size_bytes: u64,
    pub shared_layers: usize,
    pub shared_size_bytes: u64,
    pub avg_layers_per_image: f64,
    pub avg_ref_count: f64,
}

struct PendingImage {
    id: ImageId,
    repository: String,
    inspection: ImageInspection,
}

/// Accumulates inspected images, then freezes them into a [`LayerGraph`].
#[derive(Default)]
pub struct LayerGraphBuilder {
    pending: Vec<PendingImage>,
    positions: HashMap<ImageId, usize>,
}

impl LayerGraphBuilder {
    /// Add an inspected image. Adding the same id again replaces the earlier entry.
    pub fn add_image(
        &mut self,
        id: ImageId,
        repository: impl Into<String>,
        inspection: ImageInspection,
    ) -> &mut Self {
        let entry = PendingImage {
            id: id.clone(),
            repository: repository.into(),
            inspection,
        };
        match self.positions.get(&id) {
            Some(&pos) => self.pending[pos] = entry,
            None => {
                self.positions.insert(id, self.pending.len());
                self.pending.push(entry);
            }
        }
        self
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn build(self) -> LayerGraph {
        let mut graph = LayerGraph::default();

        for pending in self.pending {
            let mut layers = Vec::with_capacity(pending.inspection.layers.len());
            let mut distinct = Vec::new();
            let mut seen = HashSet::new();

            for info in pending.inspection.layers {
                let idx = match graph.by_digest.get(&info.digest) {
                    Some(&idx) => {
                        let known = graph.layers[idx.0].size_bytes;
                        if known != info.size_bytes {
                            tracing::debug!(
                                "layer {} reported as {} and {} bytes, keeping {}",
                                info.digest.short(),
                                known,
                                info.size_bytes,
                                known
                            );
                        }
                        idx
                    }
                    None => {
                        let idx = LayerIdx(graph.layers.len());
                        graph.by_digest.insert(info.digest.clone(), idx);
                        graph.layers.push(LayerRecord {
                            digest: info.digest,
                            size_bytes: info.size_bytes,
                            ref_count: 0,
                        });
                        idx
                    }
                };
                layers.push(idx);
                if seen.insert(idx) {
                    distinct.push(idx);
                    graph.layers[idx.0].ref_count += 1;
                }
            }

            graph
                .by_image
                .insert(pending.id.clone(), graph.images.len());
            graph.images.push(ImageRecord {
                id: pending.id,
                repository: pending.repository,
                digest: pending.inspection.digest,
                layers,
                distinct,
            });
        }

        tracing::debug!(
            "built layer graph: {} images, {} layers",
            graph.images.len(),
            graph.layers.len()
        );
        graph
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::LayerInfo;

    fn inspection(layers: &[(&str, u64)]) -> ImageInspection {
        ImageInspection {
            digest: ManifestDigest::new("sha256:manifest"),
            layers: layers
                .iter()
                .map(|(d, s)| LayerInfo {
                    digest: LayerDigest::new(*d),
                    size_bytes: *s,
                })
                .collect(),
        }
    }

    fn id(tag: &str) -> ImageId {
        ImageId::new("environment", tag).unwrap()
    }

    #[test]
    fn ref_count_counts_distinct_images() {
        let mut builder = LayerGraph::builder();
        builder
            .add_image(id("a"), "r/environment", inspection(&[("l1", 10), ("l1", 10)]))
            .add_image(id("b"), "r/environment", inspection(&[("l1", 10)]));
        let graph = builder.build();

        let l1 = graph.layer_by_digest(&LayerDigest::new("l1")).unwrap();
        assert_eq!(l1.ref_count, 2);
        assert_eq!(graph.image(&id("a")).unwrap().layer_order().len(), 2);
        assert_eq!(graph.freed_space_if_deleted([&id("a"), &id("b")]), 10);
        assert_eq!(graph.image_total_size(&id("a")), 10);
    }

    #[test]
    fn re_adding_image_replaces_it() {
        let mut builder = LayerGraph::builder();
        builder
            .add_image(id("a"), "r/environment", inspection(&[("l1", 10)]))
            .add_image(id("a"), "r/environment", inspection(&[("l2", 20)]));
        let graph = builder.build();

        assert_eq!(graph.image_count(), 1);
        assert!(graph.layer_by_digest(&LayerDigest::new("l1")).is_none());
        assert_eq!(graph.freed_space_for(&id("a")), 20);
    }

    #[test]
    fn summary_splits_shared_and_single_use() {
        let mut builder = LayerGraph::builder();
        builder
            .add_image(id("a"), "r/environment", inspection(&[("s", 100), ("u1", 1)]))
            .add_image(id("b"), "r/environment", inspection(&[("s", 100), ("u2", 2)]));
        let summary = builder.build().summary();

        assert_eq!(summary.total_images, 2);
        assert_eq!(summary.total_layers, 3);
        assert_eq!(summary.total_size_bytes, 103);
        assert_eq!(summary.shared_layers, 1);
        assert_eq!(summary.shared_size_bytes, 100);
        assert_eq!(summary.single_use_layers, 2);
        assert_eq!(summary.single_use_size_bytes, 3);
        assert!((summary.avg_layers_per_image - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn prefix_and_unused_filters() {
        let mut builder = LayerGraph::builder();
        builder
            .add_image(id("abc-1"), "r/environment", inspection(&[]))
            .add_image(id("abd-2"), "r/environment", inspection(&[]));
        let graph = builder.build();

        let tags: Vec<_> = graph.images_with_tag_prefix("abc").map(|i| i.tag()).collect();
        assert_eq!(tags, vec!["abc-1"]);

        let used: HashSet<String> = ["abc-1".to_string()].into();
        let unused: Vec<_> = graph.images_not_in(&used).map(|i| i.tag()).collect();
        assert_eq!(unused, vec!["abd-2"]);
    }
}
