// ABOUTME: Error types for registry operations.
// ABOUTME: Each variant maps onto a retry class so callers can decide whether to try again.

use std::time::Duration;

use crate::retry::{Classify, ErrorClass, classify_message};

/// Errors from registry operations.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("image not found: {0}")]
    NotFound(String),

    #[error("authentication failed for registry: {0}")]
    AuthenticationFailed(String),

    #[error("rate limited by registry: {0}")]
    RateLimited(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("registry command timed out after {0:?}")]
    Timeout(Duration),

    #[error("`{command}` failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("unexpected registry response: {0}")]
    InvalidResponse(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Classify for RegistryError {
    fn class(&self) -> ErrorClass {
        match self {
            RegistryError::NotFound(_) | RegistryError::AuthenticationFailed(_) => {
                ErrorClass::Permanent
            }
            RegistryError::RateLimited(_) | RegistryError::InvalidResponse(_) => {
                ErrorClass::Temporary
            }
            RegistryError::Network(_) | RegistryError::Timeout(_) => ErrorClass::Network,
            RegistryError::CommandFailed { stderr, .. } => classify_message(stderr),
            RegistryError::Io(e) => e.class(),
        }
    }
}

impl RegistryError {
    /// Map the stderr of a failed registry tool invocation onto a variant.
    pub fn from_stderr(command: &str, stderr: &str) -> Self {
        let lower = stderr.to_lowercase();
        let trimmed = stderr.trim().to_string();
        if lower.contains("429") || lower.contains("rate limit") || lower.contains("too many requests") {
            RegistryError::RateLimited(trimmed)
        } else if lower.contains("manifest unknown")
            || lower.contains("name unknown")
            || lower.contains("not found")
            || lower.contains("404")
        {
            RegistryError::NotFound(trimmed)
        } else if lower.contains("401") || lower.contains("unauthorized") || lower.contains("authentication required") {
            RegistryError::AuthenticationFailed(trimmed)
        } else {
            RegistryError::CommandFailed {
                command: command.to_string(),
                stderr: trimmed,
            }
        }
    }
}
