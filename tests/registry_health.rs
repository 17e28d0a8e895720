// ABOUTME: Integration tests for the registry reachability check.
// ABOUTME: Candidate repositories are tried in order until one lists.

mod support;

use regsweep::registry::{RegistryError, check_reachable};
use support::MockRegistry;

#[tokio::test]
async fn first_listable_repository_answers() {
    let registry = MockRegistry::new()
        .with_image("platform/model", "m1", &[("sha256:a", 1)])
        .with_unlistable("platform/environment");

    let reachable = check_reachable(&registry, &["platform/environment", "platform/model"])
        .await
        .unwrap();

    assert_eq!(reachable.repository, "platform/model");
    assert_eq!(reachable.tag_count, 1);
}

#[tokio::test]
async fn last_error_is_returned_when_nothing_lists() {
    let registry = MockRegistry::new()
        .with_unlistable("platform/environment")
        .with_unlistable("platform/model");

    let result = check_reachable(&registry, &["platform/environment", "platform/model"]).await;

    assert!(matches!(
        result,
        Err(RegistryError::AuthenticationFailed(repo)) if repo == "platform/model"
    ));
}

#[tokio::test]
async fn empty_candidate_list_is_an_error() {
    let registry = MockRegistry::new();
    let none: [&str; 0] = [];
    assert!(check_reachable(&registry, &none).await.is_err());
}
