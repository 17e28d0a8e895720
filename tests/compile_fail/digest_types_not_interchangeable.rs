// ABOUTME: Compile-fail test verifying manifest digests are not layer digests.
// ABOUTME: This test should fail to compile, validating phantom-typed ids.

use regsweep::layers::LayerGraph;
use regsweep::types::ManifestDigest;

fn lookup(graph: &LayerGraph) {
    let manifest = ManifestDigest::new("sha256:abc");
    // ERROR: expected LayerDigest, found ManifestDigest
    let _ = graph.layer_by_digest(&manifest);
}

fn main() {}
