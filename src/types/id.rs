// ABOUTME: Phantom-typed identifiers for compile-time type safety.
// ABOUTME: Keeps layer digests, manifest digests, and job ids from being mixed up.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// Marker types for phantom type parameters.
/// Using empty enums prevents instantiation and requires no trait bounds.
pub enum LayerMarker {}
pub enum ManifestMarker {}
pub enum JobMarker {}

/// Markers whose ids are content digests (`<algorithm>:<hex>`).
pub trait DigestMarker {}

impl DigestMarker for LayerMarker {}
impl DigestMarker for ManifestMarker {}

/// A string identifier tagged with the kind of thing it names.
///
/// A layer digest and a manifest digest are both `sha256:...` strings, but a
/// manifest digest passed where a layer is expected silently corrupts the
/// reference counts, so the two are distinct types.
#[must_use = "IDs reference resources and should not be ignored"]
pub struct Id<T> {
    value: String,
    _marker: PhantomData<T>,
}

impl<T> Id<T> {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            _marker: PhantomData,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn into_inner(self) -> String {
        self.value
    }
}

impl<T: DigestMarker> Id<T> {
    /// The algorithm prefix, or `None` for a bare hex string.
    pub fn algorithm(&self) -> Option<&str> {
        self.value.split_once(':').map(|(algorithm, _)| algorithm)
    }

    pub fn hex(&self) -> &str {
        self.value
            .split_once(':')
            .map_or(self.value.as_str(), |(_, hex)| hex)
    }

    /// First 12 hex characters, for log lines.
    pub fn short(&self) -> &str {
        let hex = self.hex();
        hex.get(..12).unwrap_or(hex)
    }
}

// Manual trait implementations that don't require T to implement the trait.

impl<T> std::fmt::Debug for Id<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Id").field(&self.value).finish()
    }
}

impl<T> Clone for Id<T> {
    fn clone(&self) -> Self {
        Self::new(self.value.clone())
    }
}

impl<T> PartialEq for Id<T> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<T> Eq for Id<T> {}

impl<T> PartialOrd for Id<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Id<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.value.cmp(&other.value)
    }
}

impl<T> Hash for Id<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}

impl<T> std::fmt::Display for Id<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.value)
    }
}

impl<T> Serialize for Id<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.value.serialize(serializer)
    }
}

impl<'de, T> Deserialize<'de> for Id<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Ok(Self::new(value))
    }
}

pub type LayerDigest = Id<LayerMarker>;
pub type ManifestDigest = Id<ManifestMarker>;
pub type JobId = Id<JobMarker>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_parts() {
        let digest = LayerDigest::new("sha256:0123456789abcdef0123");
        assert_eq!(digest.algorithm(), Some("sha256"));
        assert_eq!(digest.hex(), "0123456789abcdef0123");
        assert_eq!(digest.short(), "0123456789ab");
    }

    #[test]
    fn bare_digest_has_no_algorithm() {
        let digest = ManifestDigest::new("abc");
        assert_eq!(digest.algorithm(), None);
        assert_eq!(digest.short(), "abc");
    }

    #[test]
    fn ordering_follows_the_string() {
        let mut ids = vec![JobId::new("b"), JobId::new("a")];
        ids.sort();
        assert_eq!(ids[0].as_str(), "a");
    }
}
