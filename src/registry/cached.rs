// ABOUTME: Caching decorator for any registry client.
// ABOUTME: Memoizes tag listings and inspections; deletions invalidate what they touch.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::{ImageInspection, RegistryClient, RegistryError};
use crate::cache::{CacheStats, TtlCache};

/// Cache sizing for registry lookups.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegistryCacheConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default = "default_tag_list_ttl", with = "humantime_serde")]
    pub tag_list_ttl: Duration,

    #[serde(default = "default_tag_list_size")]
    pub tag_list_size: usize,

    #[serde(default = "default_inspect_ttl", with = "humantime_serde")]
    pub inspect_ttl: Duration,

    #[serde(default = "default_inspect_size")]
    pub inspect_size: usize,
}

fn default_enabled() -> bool {
    true
}

fn default_tag_list_ttl() -> Duration {
    Duration::from_secs(30 * 60)
}

fn default_tag_list_size() -> usize {
    100
}

fn default_inspect_ttl() -> Duration {
    Duration::from_secs(60 * 60)
}

fn default_inspect_size() -> usize {
    1000
}

impl Default for RegistryCacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            tag_list_ttl: default_tag_list_ttl(),
            tag_list_size: default_tag_list_size(),
            inspect_ttl: default_inspect_ttl(),
            inspect_size: default_inspect_size(),
        }
    }
}

/// Wraps a registry client with TTL caches for reads.
pub struct CachedRegistry<R> {
    inner: R,
    tags: TtlCache<String, Vec<String>>,
    inspections: TtlCache<(String, String), ImageInspection>,
}

impl<R: RegistryClient> CachedRegistry<R> {
    pub fn new(inner: R, config: &RegistryCacheConfig) -> Self {
        Self {
            inner,
            tags: TtlCache::new(config.tag_list_ttl, Some(config.tag_list_size)),
            inspections: TtlCache::new(config.inspect_ttl, Some(config.inspect_size)),
        }
    }

    pub fn inner(&self) -> &R {
        &self.inner
    }

    /// Drop every cached entry.
    pub fn clear(&self) {
        self.tags.clear();
        self.inspections.clear();
        tracing::info!("registry caches cleared");
    }

    /// Drop expired entries from both caches, returning how many went.
    pub fn cleanup_expired(&self) -> usize {
        let removed = self.tags.cleanup_expired() + self.inspections.cleanup_expired();
        if removed > 0 {
            tracing::debug!("cleaned up {} expired registry cache entries", removed);
        }
        removed
    }

    pub fn tag_list_stats(&self) -> CacheStats {
        self.tags.stats()
    }

    pub fn inspect_stats(&self) -> CacheStats {
        self.inspections.stats()
    }
}

#[async_trait]
impl<R: RegistryClient> RegistryClient for CachedRegistry<R> {
    async fn list_tags(&self, repository: &str) -> Result<Vec<String>, RegistryError> {
        let key = repository.to_string();
        if let Some(tags) = self.tags.get(&key) {
            tracing::debug!("tag list cache hit for {}", repository);
            return Ok(tags);
        }
        let tags = self.inner.list_tags(repository).await?;
        self.tags.insert(key, tags.clone());
        Ok(tags)
    }

    async fn inspect(
        &self,
        repository: &str,
        tag: &str,
    ) -> Result<ImageInspection, RegistryError> {
        let key = (repository.to_string(), tag.to_string());
        if let Some(inspection) = self.inspections.get(&key) {
            tracing::debug!("inspect cache hit for {}:{}", repository, tag);
            return Ok(inspection);
        }
        let inspection = self.inner.inspect(repository, tag).await?;
        self.inspections.insert(key, inspection.clone());
        Ok(inspection)
    }

    async fn delete(&self, repository: &str, tag: &str) -> Result<bool, RegistryError> {
        let deleted = self.inner.delete(repository, tag).await?;
        self.inspections
            .remove(&(repository.to_string(), tag.to_string()));
        self.tags.remove(&repository.to_string());
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ManifestDigest;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Default)]
    struct CountingRegistry {
        list_calls: AtomicU32,
        inspect_calls: AtomicU32,
    }

    #[async_trait]
    impl RegistryClient for CountingRegistry {
        async fn list_tags(&self, _repository: &str) -> Result<Vec<String>, RegistryError> {
            self.list_calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec!["a".to_string()])
        }

        async fn inspect(
            &self,
            _repository: &str,
            tag: &str,
        ) -> Result<ImageInspection, RegistryError> {
            self.inspect_calls.fetch_add(1, Ordering::SeqCst);
            Ok(ImageInspection {
                digest: ManifestDigest::new(format!("sha256:{tag}")),
                layers: vec![],
            })
        }

        async fn delete(&self, _repository: &str, _tag: &str) -> Result<bool, RegistryError> {
            Ok(true)
        }
    }

    #[tokio::test]
    async fn repeated_reads_hit_cache() {
        let cached = CachedRegistry::new(CountingRegistry::default(), &RegistryCacheConfig::default());

        cached.list_tags("repo").await.unwrap();
        cached.list_tags("repo").await.unwrap();
        cached.inspect("repo", "a").await.unwrap();
        cached.inspect("repo", "a").await.unwrap();
        cached.inspect("repo", "b").await.unwrap();

        assert_eq!(cached.inner().list_calls.load(Ordering::SeqCst), 1);
        assert_eq!(cached.inner().inspect_calls.load(Ordering::SeqCst), 2);
        assert_eq!(cached.inspect_stats().hits, 1);
    }

    #[tokio::test]
    async fn delete_invalidates_entries() {
        let cached = CachedRegistry::new(CountingRegistry::default(), &RegistryCacheConfig::default());

        cached.list_tags("repo").await.unwrap();
        cached.inspect("repo", "a").await.unwrap();
        assert!(cached.delete("repo", "a").await.unwrap());
        cached.list_tags("repo").await.unwrap();
        cached.inspect("repo", "a").await.unwrap();

        assert_eq!(cached.inner().list_calls.load(Ordering::SeqCst), 2);
        assert_eq!(cached.inner().inspect_calls.load(Ordering::SeqCst), 2);
    }
}
