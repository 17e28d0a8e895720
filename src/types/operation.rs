// ABOUTME: Validated names for checkpoint namespacing.
// ABOUTME: Operation types and ids become file names, so they are restricted to a safe charset.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

const MAX_LEN: usize = 100;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum OperationNameError {
    #[error("operation name cannot be empty")]
    Empty,

    #[error("operation name exceeds maximum length of {MAX_LEN} characters")]
    TooLong,

    #[error("operation name cannot start with '{0}'")]
    InvalidStart(char),

    #[error("invalid character in operation name: '{0}'")]
    InvalidChar(char),
}

fn validate(value: &str, allow_upper: bool) -> Result<(), OperationNameError> {
    if value.is_empty() {
        return Err(OperationNameError::Empty);
    }
    if value.len() > MAX_LEN {
        return Err(OperationNameError::TooLong);
    }
    if let Some(first @ ('-' | '_' | '.')) = value.chars().next() {
        return Err(OperationNameError::InvalidStart(first));
    }
    for c in value.chars() {
        let ok = c.is_ascii_lowercase()
            || c.is_ascii_digit()
            || c == '-'
            || c == '_'
            || (allow_upper && (c.is_ascii_uppercase() || c == '.'));
        if !ok {
            return Err(OperationNameError::InvalidChar(c));
        }
    }
    Ok(())
}

/// Kind of batch operation, e.g. `delete_unused_tags`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OperationType(String);

impl OperationType {
    pub fn new(value: &str) -> Result<Self, OperationNameError> {
        validate(value, false)?;
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of one run of an operation, chosen by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OperationId(String);

impl OperationId {
    pub fn new(value: &str) -> Result<Self, OperationNameError> {
        validate(value, true)?;
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for OperationType {
    type Err = OperationNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for OperationType {
    type Error = OperationNameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<OperationType> for String {
    fn from(value: OperationType) -> Self {
        value.0
    }
}

impl FromStr for OperationId {
    type Err = OperationNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for OperationId {
    type Error = OperationNameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<OperationId> for String {
    fn from(value: OperationId) -> Self {
        value.0
    }
}
