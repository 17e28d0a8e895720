// ABOUTME: Library root for regsweep - exposes public types for the binary and tests.
// ABOUTME: The main binary is in main.rs.

pub mod cache;
pub mod checkpoint;
pub mod config;
pub mod deletion;
pub mod diagnostics;
pub mod error;
pub mod jobs;
pub mod layers;
pub mod output;
pub mod registry;
pub mod retry;
pub mod types;
pub mod usage;
