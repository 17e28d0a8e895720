// ABOUTME: Decides which tags are in use from normalized evidence records.
// ABOUTME: Config evidence always wins; activity evidence is gated by an optional recency window.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use super::evidence::{EvidenceBundle, EvidenceKind, UsageRecord};
use super::tag_match::model_tags_match;

/// Why a tag was judged in use or unused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageReason {
    /// Referenced by current configuration.
    Config,
    /// Activity inside the recency window.
    RecentActivity,
    /// Activity with no recency window in force.
    HistoricalActivity,
    /// Activity whose records carry no parseable timestamp. Kept.
    NoTimestamp,
    /// Only activity older than the recency window.
    Stale,
    /// No evidence at all.
    Unreferenced,
}

impl UsageReason {
    pub fn in_use(self) -> bool {
        matches!(
            self,
            UsageReason::Config
                | UsageReason::RecentActivity
                | UsageReason::HistoricalActivity
                | UsageReason::NoTimestamp
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            UsageReason::Config => "config",
            UsageReason::RecentActivity => "recent_activity",
            UsageReason::HistoricalActivity => "historical_activity",
            UsageReason::NoTimestamp => "no_timestamp",
            UsageReason::Stale => "stale",
            UsageReason::Unreferenced => "unreferenced",
        }
    }
}

impl fmt::Display for UsageReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decision and audit trail for one tag.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TagUsage {
    pub tag: String,
    pub reason: UsageReason,
    pub records: Vec<UsageRecord>,
    pub most_recent: Option<DateTime<Utc>>,
    pub summary: String,
}

impl TagUsage {
    pub fn in_use(&self) -> bool {
        self.reason.in_use()
    }
}

/// Outcome of checking a set of tags.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UsageVerdict {
    pub in_use: BTreeSet<String>,
    pub tags: BTreeMap<String, TagUsage>,
}

impl UsageVerdict {
    pub fn is_in_use(&self, tag: &str) -> bool {
        self.in_use.contains(tag)
    }

    pub fn usage(&self, tag: &str) -> Option<&TagUsage> {
        self.tags.get(tag)
    }

    pub fn unused(&self) -> impl Iterator<Item = &str> {
        self.tags
            .values()
            .filter(|usage| !usage.in_use())
            .map(|usage| usage.tag.as_str())
    }
}

/// Human summary of the evidence behind a tag, e.g.
/// "2 executions, 1 workspace, 1 project using as default".
pub fn summarize(records: &[UsageRecord]) -> String {
    let mut counts: HashMap<EvidenceKind, usize> = HashMap::new();
    for record in records {
        *counts.entry(record.kind).or_insert(0) += 1;
    }
    let parts: Vec<String> = EvidenceKind::ALL
        .into_iter()
        .filter_map(|kind| counts.get(&kind).map(|&n| kind.describe(n)))
        .collect();
    if parts.is_empty() {
        "no usage found".to_string()
    } else {
        parts.join(", ")
    }
}

/// Classify each tag in `tags` against `evidence`.
///
/// `recent_days` of `None` or `Some(0)` disables the recency window.
pub fn check_tags_in_use<I, S>(
    tags: I,
    evidence: &EvidenceBundle,
    recent_days: Option<u32>,
    now: DateTime<Utc>,
) -> UsageVerdict
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    check_tags_against_records(tags, &evidence.records(), recent_days, now)
}

/// Same as [`check_tags_in_use`] over already-normalized records.
pub fn check_tags_against_records<I, S>(
    tags: I,
    records: &[UsageRecord],
    recent_days: Option<u32>,
    now: DateTime<Utc>,
) -> UsageVerdict
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut exact: HashMap<&str, Vec<&UsageRecord>> = HashMap::new();
    let mut models: Vec<&UsageRecord> = Vec::new();
    for record in records {
        exact.entry(record.tag.as_str()).or_default().push(record);
        if record.kind == EvidenceKind::Model {
            models.push(record);
        }
    }

    let threshold = recent_days
        .filter(|&days| days > 0)
        .map(|days| now - Duration::days(i64::from(days)));

    let mut verdict = UsageVerdict::default();
    for tag in tags {
        let tag = tag.as_ref();
        if verdict.tags.contains_key(tag) {
            continue;
        }

        let mut matched: Vec<UsageRecord> = exact
            .get(tag)
            .map(|rs| rs.iter().map(|r| (*r).clone()).collect())
            .unwrap_or_default();
        for model in &models {
            if model.tag != tag && model_tags_match(tag, &model.tag) {
                matched.push((*model).clone());
            }
        }

        let usage = decide(tag, matched, threshold);
        tracing::debug!("tag {} -> {} ({})", tag, usage.reason, usage.summary);
        if usage.in_use() {
            verdict.in_use.insert(tag.to_string());
        }
        verdict.tags.insert(tag.to_string(), usage);
    }
    verdict
}

fn decide(tag: &str, records: Vec<UsageRecord>, threshold: Option<DateTime<Utc>>) -> TagUsage {
    let most_recent = records
        .iter()
        .filter(|r| r.kind.is_activity())
        .filter_map(UsageRecord::most_recent)
        .max();
    let has_config = records.iter().any(|r| r.kind.is_config());

    let reason = if records.is_empty() {
        UsageReason::Unreferenced
    } else if has_config {
        UsageReason::Config
    } else {
        match (threshold, most_recent) {
            (None, _) => UsageReason::HistoricalActivity,
            (Some(_), None) => UsageReason::NoTimestamp,
            (Some(threshold), Some(latest)) if latest >= threshold => UsageReason::RecentActivity,
            (Some(_), Some(_)) => UsageReason::Stale,
        }
    };

    TagUsage {
        tag: tag.to_string(),
        reason,
        summary: summarize(&records),
        records,
        most_recent,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-06-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn days_ago(days: i64) -> String {
        (now() - Duration::days(days)).to_rfc3339()
    }

    fn bundle(value: serde_json::Value) -> EvidenceBundle {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn workspace_recency_uses_last_change() {
        let evidence = bundle(json!({
            "workspaces": [
                {"environment_docker_tag": "fresh", "workspace_last_change": days_ago(2)},
                {"environment_docker_tag": "old", "workspace_last_change": days_ago(90)}
            ]
        }));
        let verdict = check_tags_in_use(["fresh", "old"], &evidence, Some(30), now());
        assert!(verdict.is_in_use("fresh"));
        assert_eq!(verdict.usage("old").unwrap().reason, UsageReason::Stale);
    }

    #[test]
    fn zero_days_disables_window() {
        let evidence = bundle(json!({
            "runs": [{"environment_docker_tag": "t", "last_used": days_ago(400)}]
        }));
        let verdict = check_tags_in_use(["t"], &evidence, Some(0), now());
        assert_eq!(verdict.usage("t").unwrap().reason, UsageReason::HistoricalActivity);
    }

    #[test]
    fn model_prefix_evidence_matches_extended_tag() {
        let evidence = bundle(json!({
            "models": [{"model_id": "m", "environment_docker_tag": "abc-v2", "last_used": days_ago(1)}]
        }));
        let verdict = check_tags_in_use(["abc-v2-1700000000_x1", "abc-v3"], &evidence, Some(7), now());
        assert!(verdict.is_in_use("abc-v2-1700000000_x1"));
        assert!(!verdict.is_in_use("abc-v3"));
    }

    #[test]
    fn summary_counts_each_kind() {
        let evidence = bundle(json!({
            "runs": [
                {"environment_docker_tag": "t"},
                {"environment_docker_tag": "t"}
            ],
            "workspaces": [{"environment_docker_tag": "t"}],
            "projects": [{"environment_docker_tag": "t"}]
        }));
        let verdict = check_tags_in_use(["t", "other"], &evidence, None, now());
        assert_eq!(
            verdict.usage("t").unwrap().summary,
            "2 executions, 1 workspace, 1 project using as default"
        );
        assert_eq!(verdict.usage("other").unwrap().reason, UsageReason::Unreferenced);
        assert_eq!(verdict.unused().collect::<Vec<_>>(), vec!["other"]);
    }
}
