// ABOUTME: Compile-fail test verifying apply cannot be called on Reported.
// ABOUTME: This test should fail to compile, validating the confirmation gate.

use regsweep::checkpoint::CheckpointManager;
use regsweep::deletion::{Deletion, Reported};
use regsweep::registry::RegistryClient;
use regsweep::retry::{RateLimiter, RetryPolicy};

async fn skip_confirmation<R: RegistryClient>(
    deletion: Deletion<Reported>,
    registry: &R,
    checkpoints: &CheckpointManager,
) {
    // ERROR: apply() method doesn't exist on Deletion<Reported>
    let _ = deletion
        .apply(registry, checkpoints, &RetryPolicy::default(), &RateLimiter::unlimited())
        .await;
}

fn main() {}
