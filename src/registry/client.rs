// ABOUTME: Registry client trait consumed by analysis and deletion.
// ABOUTME: List tags, inspect a tag's layers, delete a tag.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::RegistryError;
use crate::types::{LayerDigest, ManifestDigest};

/// One layer of an inspected image, in manifest order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerInfo {
    pub digest: LayerDigest,
    pub size_bytes: u64,
}

/// Result of inspecting a single tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageInspection {
    pub digest: ManifestDigest,
    pub layers: Vec<LayerInfo>,
}

/// Operations against a container registry.
///
/// Repositories are full paths below the registry host, e.g.
/// `platform/environment`.
#[async_trait]
pub trait RegistryClient: Send + Sync {
    /// List every tag in a repository.
    async fn list_tags(&self, repository: &str) -> Result<Vec<String>, RegistryError>;

    /// Fetch the manifest digest and ordered layer list of a tag.
    async fn inspect(&self, repository: &str, tag: &str)
    -> Result<ImageInspection, RegistryError>;

    /// Delete a tag. `Ok(false)` means the registry did not delete it.
    async fn delete(&self, repository: &str, tag: &str) -> Result<bool, RegistryError>;
}

#[async_trait]
impl<R: RegistryClient + ?Sized> RegistryClient for std::sync::Arc<R> {
    async fn list_tags(&self, repository: &str) -> Result<Vec<String>, RegistryError> {
        (**self).list_tags(repository).await
    }

    async fn inspect(
        &self,
        repository: &str,
        tag: &str,
    ) -> Result<ImageInspection, RegistryError> {
        (**self).inspect(repository, tag).await
    }

    async fn delete(&self, repository: &str, tag: &str) -> Result<bool, RegistryError> {
        (**self).delete(repository, tag).await
    }
}
