// ABOUTME: Usage-detection engine: which tags are still referenced, and why.
// ABOUTME: Evidence normalization, timestamp parsing, model tag matching, and the decision rule.

mod detect;
mod evidence;
mod tag_match;
mod timestamp;

pub use detect::{
    TagUsage, UsageReason, UsageVerdict, check_tags_against_records, check_tags_in_use, summarize,
};
pub use evidence::{ActivityTimestamps, EvidenceBundle, EvidenceError, EvidenceKind, UsageRecord};
pub use tag_match::{model_tag_prefix, model_tags_match};
pub use timestamp::{parse_timestamp, parse_timestamp_str};
