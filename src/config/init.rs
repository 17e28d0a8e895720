// ABOUTME: Config scaffolding for new installations.
// ABOUTME: Writes a commented regsweep.yml template.

use std::path::Path;

use crate::error::{Error, Result};
use crate::types::ImageId;

use super::CONFIG_FILENAME;

/// Write `regsweep.yml` into `dir`.
pub fn init_config(
    dir: &Path,
    registry: Option<&str>,
    image_types: &[String],
    force: bool,
) -> Result<()> {
    let config_path = dir.join(CONFIG_FILENAME);

    if config_path.exists() && !force {
        return Err(Error::AlreadyExists(config_path));
    }

    let defaults = ["environment".to_string(), "model".to_string()];
    let image_types = if image_types.is_empty() {
        &defaults[..]
    } else {
        image_types
    };
    for image_type in image_types {
        ImageId::new(image_type, "latest").map_err(|e| {
            Error::InvalidConfig(format!("invalid image type '{}': {}", image_type, e))
        })?;
    }

    let yaml = template_yaml(registry.unwrap_or("registry.example.com"), image_types);
    std::fs::write(&config_path, yaml)?;
    tracing::info!("wrote {}", config_path.display());

    Ok(())
}

fn template_yaml(registry: &str, image_types: &[String]) -> String {
    format!(
        r#"registry:
  url: {registry}
  repository_prefix: ""
  image_types: [{}]
  tls_verify: true
  # authfile:
  #   env: REGISTRY_AUTH_FILE
  command_timeout: 5m

retry:
  max_retries: 3
  initial_delay: 1s
  max_delay: 60s

rate_limit:
  requests_per_second: 10.0
  burst: 20

workers: 4
checkpoint_dir: .regsweep/checkpoints
reports_dir: .
# evidence: usage-evidence.json
"#,
        image_types.join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn template_parses_back() {
        let yaml = template_yaml("registry.internal:5000", &["environment".to_string()]);
        let config = Config::from_yaml(&yaml).unwrap();
        assert_eq!(config.registry.url, "registry.internal:5000");
        assert_eq!(config.registry.image_types.len(), 1);
    }

    #[test]
    fn refuses_to_overwrite_without_force() {
        let dir = tempfile::tempdir().unwrap();
        init_config(dir.path(), None, &[], false).unwrap();
        assert!(matches!(
            init_config(dir.path(), None, &[], false),
            Err(Error::AlreadyExists(_))
        ));
        init_config(dir.path(), None, &[], true).unwrap();
    }

    #[test]
    fn rejects_invalid_image_type() {
        let dir = tempfile::tempdir().unwrap();
        let result = init_config(dir.path(), None, &["bad type".to_string()], false);
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }
}
