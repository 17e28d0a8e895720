// ABOUTME: Registry image identifier of the form <image-type>:<tag>.
// ABOUTME: Validates both halves so malformed ids fail before any registry call.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

/// Longest tag the registry accepts.
const MAX_TAG_LEN: usize = 128;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseImageIdError {
    #[error("image id cannot be empty")]
    Empty,

    #[error("image id must have the form <image-type>:<tag>: {0}")]
    MissingSeparator(String),

    #[error("image type cannot be empty")]
    EmptyType,

    #[error("tag cannot be empty")]
    EmptyTag,

    #[error("tag exceeds maximum length of {MAX_TAG_LEN} characters")]
    TagTooLong,

    #[error("tag cannot start with '{0}'")]
    InvalidTagStart(char),

    #[error("invalid character in image id: '{0}'")]
    InvalidChar(char),
}

/// A tag within one image-type repository, e.g. `environment:abc123`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImageId {
    image_type: String,
    tag: String,
}

impl ImageId {
    pub fn new(image_type: &str, tag: &str) -> Result<Self, ParseImageIdError> {
        if image_type.is_empty() {
            return Err(ParseImageIdError::EmptyType);
        }
        for c in image_type.chars() {
            if !c.is_ascii_alphanumeric() && !matches!(c, '-' | '_' | '.' | '/') {
                return Err(ParseImageIdError::InvalidChar(c));
            }
        }

        if tag.is_empty() {
            return Err(ParseImageIdError::EmptyTag);
        }
        if tag.len() > MAX_TAG_LEN {
            return Err(ParseImageIdError::TagTooLong);
        }
        if let Some(first @ ('.' | '-')) = tag.chars().next() {
            return Err(ParseImageIdError::InvalidTagStart(first));
        }
        for c in tag.chars() {
            if !c.is_ascii_alphanumeric() && !matches!(c, '-' | '_' | '.') {
                return Err(ParseImageIdError::InvalidChar(c));
            }
        }

        Ok(Self {
            image_type: image_type.to_string(),
            tag: tag.to_string(),
        })
    }

    pub fn parse(input: &str) -> Result<Self, ParseImageIdError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(ParseImageIdError::Empty);
        }
        let (image_type, tag) = input
            .rsplit_once(':')
            .ok_or_else(|| ParseImageIdError::MissingSeparator(input.to_string()))?;
        Self::new(image_type, tag)
    }

    pub fn image_type(&self) -> &str {
        &self.image_type
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Repository path for this image under a repository prefix.
    pub fn repository(&self, prefix: &str) -> String {
        let prefix = prefix.trim_end_matches('/');
        if prefix.is_empty() {
            self.image_type.clone()
        } else {
            format!("{}/{}", prefix, self.image_type)
        }
    }
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.image_type, self.tag)
    }
}

impl std::str::FromStr for ImageId {
    type Err = ParseImageIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for ImageId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ImageId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}
