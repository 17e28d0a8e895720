// ABOUTME: Compile-fail test verifying an applied deletion cannot be reported again.
// ABOUTME: This test should fail to compile, validating state machine safety.

use regsweep::deletion::{Applied, Deletion};
use std::path::Path;

fn report_twice(deletion: Deletion<Applied>) {
    // ERROR: report() method doesn't exist on Deletion<Applied>
    let _ = deletion.report(Path::new("."));
}

fn main() {}
