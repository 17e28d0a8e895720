// ABOUTME: Pre-flight reachability check run before destructive work.
// ABOUTME: Lists tags in each candidate repository until one answers.

use super::{RegistryClient, RegistryError};

/// A repository that answered a tag listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reachable {
    pub repository: String,
    pub tag_count: usize,
}

/// Confirm the registry answers before anything is deleted.
///
/// Tries `repositories` in order and returns the first that lists. When none
/// does, the last error is returned. An empty candidate list is an error
/// since nothing was checked.
pub async fn check_reachable<R, S>(
    registry: &R,
    repositories: &[S],
) -> Result<Reachable, RegistryError>
where
    R: RegistryClient + ?Sized,
    S: AsRef<str>,
{
    let mut last_error = None;
    for repository in repositories {
        let repository = repository.as_ref();
        match registry.list_tags(repository).await {
            Ok(tags) => {
                tracing::info!(
                    "registry reachable via {} ({} tags)",
                    repository,
                    tags.len()
                );
                return Ok(Reachable {
                    repository: repository.to_string(),
                    tag_count: tags.len(),
                });
            }
            Err(e) => {
                tracing::debug!("reachability check failed for {}: {}", repository, e);
                last_error = Some(e);
            }
        }
    }
    Err(last_error.unwrap_or_else(|| RegistryError::NotFound("no repositories to check".to_string())))
}
