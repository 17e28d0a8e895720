// ABOUTME: Config values that may be read from the environment at run time.
// ABOUTME: Keeps secrets such as registry credential paths out of the YAML file.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::PathBuf;

/// Either a literal string or `{ env: VAR, default: ... }`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum EnvValue {
    Literal(String),
    FromEnv {
        #[serde(rename = "env")]
        var: String,
        #[serde(default)]
        default: Option<String>,
    },
}

impl EnvValue {
    pub fn resolve(&self) -> Result<String> {
        match self {
            EnvValue::Literal(s) => Ok(s.clone()),
            EnvValue::FromEnv { var, default } => std::env::var(var)
                .ok()
                .or_else(|| default.clone())
                .ok_or_else(|| Error::MissingEnvVar(var.clone())),
        }
    }

    /// Resolve as a file path. An empty value means unset, and a leading
    /// `~/` expands to `$HOME`.
    pub fn resolve_path(&self) -> Result<Option<PathBuf>> {
        let value = self.resolve()?;
        if value.is_empty() {
            return Ok(None);
        }
        if let Some(rest) = value.strip_prefix("~/")
            && let Some(home) = std::env::var_os("HOME")
        {
            return Ok(Some(PathBuf::from(home).join(rest)));
        }
        Ok(Some(PathBuf::from(value)))
    }
}
