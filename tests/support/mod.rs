// ABOUTME: Test support utilities.
// ABOUTME: In-memory registry double and tracing setup for integration tests.

// Each test binary only uses some of these helpers, so allow dead_code.
#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use regsweep::registry::{ImageInspection, LayerInfo, RegistryClient, RegistryError};
use regsweep::types::{LayerDigest, ManifestDigest};
use std::collections::HashMap;
use std::sync::Once;

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for tests. Safe to call multiple times.
#[allow(dead_code)]
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::EnvFilter;
        let filter = EnvFilter::from_default_env()
            .add_directive("regsweep=debug".parse().unwrap());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// Build an inspection from `(layer digest, size)` pairs.
#[allow(dead_code)]
pub fn inspection(manifest: &str, layers: &[(&str, u64)]) -> ImageInspection {
    ImageInspection {
        digest: ManifestDigest::new(manifest),
        layers: layers
            .iter()
            .map(|(digest, size)| LayerInfo {
                digest: LayerDigest::new(*digest),
                size_bytes: *size,
            })
            .collect(),
    }
}

/// How a scripted delete behaves.
#[allow(dead_code)]
#[derive(Debug, Clone, Copy)]
pub enum DeleteBehavior {
    /// The registry refuses (`Ok(false)`).
    Refuse,
    /// Permanent failure; never retried.
    Unauthorized,
    /// Network failure for the first `n` attempts, then success.
    FlakyNetwork(u32),
    /// Network failure on every attempt.
    Down,
}

/// In-memory registry with scriptable failures.
#[derive(Default)]
pub struct MockRegistry {
    tags: HashMap<String, Vec<String>>,
    inspections: HashMap<(String, String), ImageInspection>,
    unlistable: Vec<String>,
    uninspectable: Vec<(String, String)>,
    delete_behavior: HashMap<String, DeleteBehavior>,
    attempts: Mutex<HashMap<String, u32>>,
    deleted: Mutex<Vec<(String, String)>>,
}

#[allow(dead_code)]
impl MockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_image(
        mut self,
        repository: &str,
        tag: &str,
        layers: &[(&str, u64)],
    ) -> Self {
        self.tags
            .entry(repository.to_string())
            .or_default()
            .push(tag.to_string());
        self.inspections.insert(
            (repository.to_string(), tag.to_string()),
            inspection(&format!("sha256:m-{tag}"), layers),
        );
        self
    }

    pub fn with_unlistable(mut self, repository: &str) -> Self {
        self.unlistable.push(repository.to_string());
        self
    }

    pub fn with_uninspectable(mut self, repository: &str, tag: &str) -> Self {
        self.tags
            .entry(repository.to_string())
            .or_default()
            .push(tag.to_string());
        self.uninspectable
            .push((repository.to_string(), tag.to_string()));
        self
    }

    pub fn with_delete_behavior(mut self, tag: &str, behavior: DeleteBehavior) -> Self {
        self.delete_behavior.insert(tag.to_string(), behavior);
        self
    }

    /// `repository:tag` of every successful delete, in call order.
    pub fn deleted(&self) -> Vec<String> {
        self.deleted
            .lock()
            .iter()
            .map(|(repo, tag)| format!("{repo}:{tag}"))
            .collect()
    }

    pub fn delete_attempts(&self, tag: &str) -> u32 {
        self.attempts.lock().get(tag).copied().unwrap_or(0)
    }
}

#[async_trait]
impl RegistryClient for MockRegistry {
    async fn list_tags(&self, repository: &str) -> Result<Vec<String>, RegistryError> {
        if self.unlistable.iter().any(|r| r == repository) {
            return Err(RegistryError::AuthenticationFailed(repository.to_string()));
        }
        Ok(self.tags.get(repository).cloned().unwrap_or_default())
    }

    async fn inspect(
        &self,
        repository: &str,
        tag: &str,
    ) -> Result<ImageInspection, RegistryError> {
        let key = (repository.to_string(), tag.to_string());
        if self.uninspectable.contains(&key) {
            return Err(RegistryError::NotFound(format!("{repository}:{tag}")));
        }
        self.inspections
            .get(&key)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(format!("{repository}:{tag}")))
    }

    async fn delete(&self, repository: &str, tag: &str) -> Result<bool, RegistryError> {
        let attempt = {
            let mut attempts = self.attempts.lock();
            let n = attempts.entry(tag.to_string()).or_insert(0);
            *n += 1;
            *n
        };
        match self.delete_behavior.get(tag) {
            Some(DeleteBehavior::Refuse) => Ok(false),
            Some(DeleteBehavior::Unauthorized) => {
                Err(RegistryError::AuthenticationFailed("denied".to_string()))
            }
            Some(DeleteBehavior::FlakyNetwork(n)) if attempt <= *n => {
                Err(RegistryError::Network("connection reset".to_string()))
            }
            Some(DeleteBehavior::Down) => {
                Err(RegistryError::Network("connection refused".to_string()))
            }
            _ => {
                self.deleted
                    .lock()
                    .push((repository.to_string(), tag.to_string()));
                Ok(true)
            }
        }
    }
}
