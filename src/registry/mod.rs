// ABOUTME: Boundary to the container registry.
// ABOUTME: Client trait, skopeo-backed implementation, caching decorator, and reachability check.

mod cached;
mod client;
mod error;
mod health;
mod skopeo;

pub use cached::{CachedRegistry, RegistryCacheConfig};
pub use client::{ImageInspection, LayerInfo, RegistryClient};
pub use error::RegistryError;
pub use health::{Reachable, check_reachable};
pub use skopeo::{SkopeoConfig, SkopeoRegistry};
