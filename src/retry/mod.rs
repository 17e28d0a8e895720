// ABOUTME: Retry policy, failure classification, and rate limiting.
// ABOUTME: Wraps unreliable registry calls so transient failures do not abort a batch.

mod classify;
mod policy;
mod rate_limit;

pub use classify::{Classify, ErrorClass, classify_message, classify_status};
pub use policy::RetryPolicy;
pub use rate_limit::{RateLimitConfig, RateLimiter};
