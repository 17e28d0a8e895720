// ABOUTME: Populates a layer graph builder by inspecting every tag of a repository.
// ABOUTME: Inspections run on a bounded pool of concurrent futures; failures skip the tag.

use std::collections::HashMap;

use futures::StreamExt;
use parking_lot::Mutex;

use super::LayerGraphBuilder;
use crate::registry::{ImageInspection, RegistryClient, RegistryError};
use crate::retry::RetryPolicy;
use crate::types::ImageId;

/// Tag reserved for build caches; never analyzed.
pub const BUILDCACHE_TAG: &str = "buildcache";

/// Knobs for one repository scan.
#[derive(Debug, Clone)]
pub struct AnalyzeOptions {
    /// Maximum concurrent inspections.
    pub workers: usize,
    /// Only analyze tags starting with one of these. Empty means all tags.
    pub tag_prefixes: Vec<String>,
    pub retry: RetryPolicy,
}

impl Default for AnalyzeOptions {
    fn default() -> Self {
        Self {
            workers: 4,
            tag_prefixes: Vec::new(),
            retry: RetryPolicy::default(),
        }
    }
}

/// What a repository scan saw.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepositoryScan {
    pub repository: String,
    pub image_type: String,
    /// Tags considered after buildcache and prefix filtering.
    pub candidates: usize,
    pub inspected: usize,
    /// `(tag, error)` for every tag whose inspection failed.
    pub failures: Vec<(String, String)>,
}

/// Keep tags that start with any of `prefixes`; all tags when `prefixes` is empty.
pub fn filter_tags_by_prefix(tags: Vec<String>, prefixes: &[String]) -> Vec<String> {
    if prefixes.is_empty() {
        return tags;
    }
    tags.into_iter()
        .filter(|tag| prefixes.iter().any(|p| tag.starts_with(p.as_str())))
        .collect()
}

/// Inspect every tag in `repository` and add the results to `builder`.
///
/// A tag listing failure is returned as an error and is fatal for this
/// repository only. Individual inspection failures are logged, recorded in
/// the returned scan, and the tag is left out of the graph.
pub async fn analyze_repository<R>(
    registry: &R,
    builder: &mut LayerGraphBuilder,
    repository: &str,
    image_type: &str,
    options: &AnalyzeOptions,
) -> Result<RepositoryScan, RegistryError>
where
    R: RegistryClient + ?Sized,
{
    let tags = options
        .retry
        .retry(&format!("list tags of {}", repository), || {
            registry.list_tags(repository)
        })
        .await?;

    let listed = tags.len();
    let tags: Vec<String> = tags.into_iter().filter(|t| t != BUILDCACHE_TAG).collect();
    if tags.len() != listed {
        tracing::info!(
            "skipping {} '{}' tag(s) for {}",
            listed - tags.len(),
            BUILDCACHE_TAG,
            image_type
        );
    }

    let before_filter = tags.len();
    let tags = filter_tags_by_prefix(tags, &options.tag_prefixes);
    if !options.tag_prefixes.is_empty() {
        tracing::info!(
            "filtered tags for {}: {}/{} match the requested prefixes",
            image_type,
            tags.len(),
            before_filter
        );
        if tags.is_empty() {
            tracing::warn!("no tags match the requested prefixes for {}", image_type);
        }
    }

    let mut scan = RepositoryScan {
        repository: repository.to_string(),
        image_type: image_type.to_string(),
        candidates: tags.len(),
        ..RepositoryScan::default()
    };

    let workers = options.workers.max(1);
    tracing::info!(
        "analyzing {} tags for {} (using {} workers)",
        tags.len(),
        image_type,
        workers
    );

    let results: Mutex<HashMap<String, ImageInspection>> = Mutex::new(HashMap::new());
    let failures: Mutex<Vec<(String, String)>> = Mutex::new(Vec::new());
    let total = tags.len();
    let mut completed = 0usize;

    let mut inspections = futures::stream::iter(tags)
        .map(|tag| {
            let results = &results;
            let failures = &failures;
            async move {
                let label = format!("inspect {}:{}", image_type, tag);
                let outcome = options
                    .retry
                    .retry(&label, || registry.inspect(repository, &tag))
                    .await;
                match outcome {
                    Ok(inspection) => {
                        results.lock().insert(tag, inspection);
                    }
                    Err(e) => {
                        tracing::error!("failed to inspect {}:{}: {}", image_type, tag, e);
                        failures.lock().push((tag, e.to_string()));
                    }
                }
            }
        })
        .buffer_unordered(workers);

    while inspections.next().await.is_some() {
        completed += 1;
        if completed % 10 == 0 || completed == total {
            tracing::info!(
                "progress: {}/{} tags processed ({:.1}%)",
                completed,
                total,
                completed as f64 / total as f64 * 100.0
            );
        }
    }
    drop(inspections);

    let mut results: Vec<(String, ImageInspection)> = results.into_inner().into_iter().collect();
    results.sort_by(|a, b| a.0.cmp(&b.0));
    scan.failures = failures.into_inner();
    scan.failures.sort();

    for (tag, inspection) in results {
        match ImageId::new(image_type, &tag) {
            Ok(id) => {
                builder.add_image(id, repository, inspection);
                scan.inspected += 1;
            }
            Err(e) => {
                tracing::warn!("skipping tag {:?} in {}: {}", tag, repository, e);
                scan.failures.push((tag, e.to_string()));
            }
        }
    }

    tracing::info!(
        "successfully inspected {}/{} tags for {}",
        scan.inspected,
        scan.candidates,
        image_type
    );
    Ok(scan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::LayerInfo;
    use crate::types::{LayerDigest, ManifestDigest};
    use async_trait::async_trait;
    use std::time::Duration;

    struct FakeRegistry {
        tags: Vec<&'static str>,
        broken: &'static str,
    }

    #[async_trait]
    impl RegistryClient for FakeRegistry {
        async fn list_tags(&self, _repository: &str) -> Result<Vec<String>, RegistryError> {
            Ok(self.tags.iter().map(|t| t.to_string()).collect())
        }

        async fn inspect(
            &self,
            _repository: &str,
            tag: &str,
        ) -> Result<ImageInspection, RegistryError> {
            if tag == self.broken {
                return Err(RegistryError::NotFound(tag.to_string()));
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
            Ok(ImageInspection {
                digest: ManifestDigest::new(format!("sha256:{tag}")),
                layers: vec![
                    LayerInfo {
                        digest: LayerDigest::new("base"),
                        size_bytes: 100,
                    },
                    LayerInfo {
                        digest: LayerDigest::new(format!("own-{tag}")),
                        size_bytes: 10,
                    },
                ],
            })
        }

        async fn delete(&self, _repository: &str, _tag: &str) -> Result<bool, RegistryError> {
            Ok(true)
        }
    }

    fn options() -> AnalyzeOptions {
        AnalyzeOptions {
            workers: 2,
            tag_prefixes: Vec::new(),
            retry: RetryPolicy::none(),
        }
    }

    #[tokio::test]
    async fn skips_buildcache_and_failed_tags() {
        let registry = FakeRegistry {
            tags: vec!["a", "b", "buildcache", "gone"],
            broken: "gone",
        };
        let mut builder = LayerGraphBuilder::default();

        let scan = analyze_repository(&registry, &mut builder, "r/environment", "environment", &options())
            .await
            .unwrap();

        assert_eq!(scan.candidates, 3);
        assert_eq!(scan.inspected, 2);
        assert_eq!(scan.failures.len(), 1);
        assert_eq!(scan.failures[0].0, "gone");

        let graph = builder.build();
        assert_eq!(graph.image_count(), 2);
        assert_eq!(
            graph.layer_by_digest(&LayerDigest::new("base")).unwrap().ref_count,
            2
        );
    }

    #[tokio::test]
    async fn prefix_filter_limits_tags() {
        let registry = FakeRegistry {
            tags: vec!["abc-1", "abc-2", "xyz-1"],
            broken: "",
        };
        let mut builder = LayerGraphBuilder::default();
        let mut opts = options();
        opts.tag_prefixes = vec!["abc".to_string()];

        let scan = analyze_repository(&registry, &mut builder, "r/model", "model", &opts)
            .await
            .unwrap();

        assert_eq!(scan.candidates, 2);
        assert_eq!(builder.len(), 2);
    }

    #[test]
    fn empty_prefix_list_keeps_everything() {
        let tags = vec!["a".to_string(), "b".to_string()];
        assert_eq!(filter_tags_by_prefix(tags.clone(), &[]), tags);
    }
}
