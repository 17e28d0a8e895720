// ABOUTME: Registry client backed by the skopeo command-line tool.
// ABOUTME: Shells out per call, throttled by a shared rate limiter and bounded by a timeout.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;

use super::{ImageInspection, LayerInfo, RegistryClient, RegistryError};
use crate::retry::RateLimiter;
use crate::types::{LayerDigest, ManifestDigest};

/// How to reach the registry through skopeo.
#[derive(Debug, Clone)]
pub struct SkopeoConfig {
    /// Registry host, e.g. `registry.internal:5000`.
    pub registry_url: String,
    pub tls_verify: bool,
    pub authfile: Option<PathBuf>,
    pub command_timeout: Duration,
    /// Executable to run; overridable for tests.
    pub binary: String,
}

impl SkopeoConfig {
    pub fn new(registry_url: impl Into<String>) -> Self {
        Self {
            registry_url: registry_url.into(),
            tls_verify: true,
            authfile: None,
            command_timeout: Duration::from_secs(300),
            binary: "skopeo".to_string(),
        }
    }
}

#[derive(Deserialize)]
struct TagList {
    #[serde(rename = "Tags", default)]
    tags: Vec<String>,
}

#[derive(Deserialize)]
struct Inspection {
    #[serde(rename = "Digest", default)]
    digest: String,
    #[serde(rename = "LayersData", default)]
    layers_data: Vec<InspectedLayer>,
}

#[derive(Deserialize)]
struct InspectedLayer {
    #[serde(rename = "Digest")]
    digest: String,
    #[serde(rename = "Size", default)]
    size: u64,
}

/// `RegistryClient` that runs `skopeo list-tags|inspect|delete`.
pub struct SkopeoRegistry {
    config: SkopeoConfig,
    limiter: Arc<RateLimiter>,
}

impl SkopeoRegistry {
    pub fn new(config: SkopeoConfig, limiter: Arc<RateLimiter>) -> Self {
        Self { config, limiter }
    }

    fn reference(&self, repository: &str, tag: Option<&str>) -> String {
        match tag {
            Some(tag) => format!("docker://{}/{}:{}", self.config.registry_url, repository, tag),
            None => format!("docker://{}/{}", self.config.registry_url, repository),
        }
    }

    fn common_args(&self) -> Vec<String> {
        let mut args = vec![format!("--tls-verify={}", self.config.tls_verify)];
        if let Some(ref authfile) = self.config.authfile {
            args.push("--authfile".to_string());
            args.push(authfile.display().to_string());
        }
        args
    }

    /// Run one skopeo subcommand and return its stdout.
    ///
    /// Reads wait on the rate limiter here; deletes are paced by the caller.
    async fn run(&self, subcommand: &str, reference: String) -> Result<String, RegistryError> {
        if subcommand != "delete" {
            self.limiter.acquire().await;
        }

        let label = format!("{} {} {}", self.config.binary, subcommand, reference);
        tracing::debug!("running {}", label);

        let child = Command::new(&self.config.binary)
            .arg(subcommand)
            .args(self.common_args())
            .arg(&reference)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.config.command_timeout, child)
            .await
            .map_err(|_| RegistryError::Timeout(self.config.command_timeout))??;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(RegistryError::from_stderr(&label, &stderr))
        }
    }
}

#[async_trait]
impl RegistryClient for SkopeoRegistry {
    async fn list_tags(&self, repository: &str) -> Result<Vec<String>, RegistryError> {
        let stdout = self.run("list-tags", self.reference(repository, None)).await?;
        parse_tag_list(&stdout)
    }

    async fn inspect(
        &self,
        repository: &str,
        tag: &str,
    ) -> Result<ImageInspection, RegistryError> {
        let stdout = self.run("inspect", self.reference(repository, Some(tag))).await?;
        parse_inspection(&stdout)
    }

    async fn delete(&self, repository: &str, tag: &str) -> Result<bool, RegistryError> {
        match self.run("delete", self.reference(repository, Some(tag))).await {
            Ok(_) => Ok(true),
            Err(RegistryError::NotFound(msg)) => {
                tracing::warn!(
                    "{}:{} not found in registry (may already be deleted): {}",
                    repository,
                    tag,
                    msg
                );
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }
}

fn parse_tag_list(stdout: &str) -> Result<Vec<String>, RegistryError> {
    serde_json::from_str::<TagList>(stdout)
        .map(|list| list.tags)
        .map_err(|e| RegistryError::InvalidResponse(format!("tag list: {}", e)))
}

fn parse_inspection(stdout: &str) -> Result<ImageInspection, RegistryError> {
    let raw: Inspection = serde_json::from_str(stdout)
        .map_err(|e| RegistryError::InvalidResponse(format!("inspection: {}", e)))?;
    Ok(ImageInspection {
        digest: ManifestDigest::new(raw.digest),
        layers: raw
            .layers_data
            .into_iter()
            .map(|l| LayerInfo {
                digest: LayerDigest::new(l.digest),
                size_bytes: l.size,
            })
            .collect(),
    })
}
