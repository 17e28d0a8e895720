// ABOUTME: Configuration types and parsing for regsweep.yml.
// ABOUTME: Handles YAML parsing, discovery, env var interpolation, and validation.

mod env_value;
mod init;

pub use env_value::EnvValue;
pub use init::init_config;

use crate::error::{Error, Result};
use crate::registry::{RegistryCacheConfig, SkopeoConfig};
use crate::retry::{RateLimitConfig, RetryPolicy};
use crate::types::ImageId;
use nonempty::NonEmpty;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILENAME: &str = "regsweep.yml";
pub const CONFIG_FILENAME_ALT: &str = "regsweep.yaml";
pub const CONFIG_FILENAME_DIR: &str = ".regsweep/config.yml";

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub registry: RegistryConfig,

    #[serde(default)]
    pub retry: RetryPolicy,

    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    #[serde(default)]
    pub cache: RegistryCacheConfig,

    /// Concurrent inspections per repository.
    #[serde(default = "default_workers")]
    pub workers: usize,

    #[serde(default = "default_checkpoint_dir")]
    pub checkpoint_dir: PathBuf,

    #[serde(default = "default_reports_dir")]
    pub reports_dir: PathBuf,

    /// Evidence bundle used when `--evidence` is not given.
    #[serde(default)]
    pub evidence: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegistryConfig {
    /// Registry host, e.g. `registry.internal:5000`.
    pub url: String,

    /// Path prepended to every image type to form the repository name.
    #[serde(default)]
    pub repository_prefix: String,

    #[serde(deserialize_with = "deserialize_image_types")]
    pub image_types: NonEmpty<String>,

    #[serde(default = "default_tls_verify")]
    pub tls_verify: bool,

    #[serde(default)]
    pub authfile: Option<EnvValue>,

    #[serde(default = "default_command_timeout", with = "humantime_serde")]
    pub command_timeout: Duration,

    #[serde(default = "default_skopeo_binary")]
    pub skopeo_binary: String,
}

fn default_workers() -> usize {
    4
}

fn default_checkpoint_dir() -> PathBuf {
    PathBuf::from(".regsweep/checkpoints")
}

fn default_reports_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_tls_verify() -> bool {
    true
}

fn default_command_timeout() -> Duration {
    Duration::from_secs(300)
}

fn default_skopeo_binary() -> String {
    "skopeo".to_string()
}

impl Config {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn discover(dir: &Path) -> Result<Self> {
        let candidates = [
            dir.join(CONFIG_FILENAME),
            dir.join(CONFIG_FILENAME_ALT),
            dir.join(CONFIG_FILENAME_DIR),
        ];

        for path in &candidates {
            if path.exists() {
                tracing::debug!("loading configuration from {}", path.display());
                return Self::load(path);
            }
        }

        Err(Error::ConfigNotFound(dir.to_path_buf()))
    }

    fn validate(&self) -> Result<()> {
        if self.registry.url.trim().is_empty() {
            return Err(Error::InvalidConfig("registry.url cannot be empty".to_string()));
        }
        if self.workers == 0 {
            return Err(Error::InvalidConfig("workers must be at least 1".to_string()));
        }
        if self.retry.exponential_base < 1.0 {
            return Err(Error::InvalidConfig(
                "retry.exponential_base must be at least 1".to_string(),
            ));
        }
        if self.retry.max_delay < self.retry.initial_delay {
            return Err(Error::InvalidConfig(
                "retry.max_delay must not be shorter than retry.initial_delay".to_string(),
            ));
        }
        Ok(())
    }

    /// `(image_type, repository)` for every configured image type.
    pub fn repositories(&self) -> Vec<(String, String)> {
        self.registry
            .image_types
            .iter()
            .map(|image_type| {
                let prefix = self.registry.repository_prefix.trim_end_matches('/');
                let repository = if prefix.is_empty() {
                    image_type.clone()
                } else {
                    format!("{}/{}", prefix, image_type)
                };
                (image_type.clone(), repository)
            })
            .collect()
    }

    /// Build the skopeo settings, resolving the authfile from the environment.
    pub fn skopeo_config(&self) -> Result<SkopeoConfig> {
        let authfile = self
            .registry
            .authfile
            .as_ref()
            .map(EnvValue::resolve_path)
            .transpose()?
            .flatten();

        let mut skopeo = SkopeoConfig::new(self.registry.url.clone());
        skopeo.tls_verify = self.registry.tls_verify;
        skopeo.authfile = authfile;
        skopeo.command_timeout = self.registry.command_timeout;
        skopeo.binary = self.registry.skopeo_binary.clone();
        Ok(skopeo)
    }
}

fn deserialize_image_types<'de, D>(deserializer: D) -> std::result::Result<NonEmpty<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let values: Vec<String> = Vec::deserialize(deserializer)?;
    for value in &values {
        // Any valid tag will do; this only checks the type half.
        ImageId::new(value, "latest").map_err(|e| {
            serde::de::Error::custom(format!("invalid image type '{}': {}", value, e))
        })?;
    }
    NonEmpty::from_vec(values)
        .ok_or_else(|| serde::de::Error::custom("at least one image type is required"))
}
