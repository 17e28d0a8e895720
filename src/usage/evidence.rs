// ABOUTME: Evidence bundle loaded from document-store query results.
// ABOUTME: Normalizes seven heterogeneous document lists into uniform usage records.

use std::fmt;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::timestamp::parse_timestamp;

/// Errors loading an evidence bundle.
#[derive(Debug, thiserror::Error)]
pub enum EvidenceError {
    #[error("failed to read evidence file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("invalid evidence JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Source of a usage record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceKind {
    Run,
    Workspace,
    Model,
    SchedulerJob,
    Project,
    Organization,
    AppVersion,
}

impl EvidenceKind {
    pub const ALL: [EvidenceKind; 7] = [
        EvidenceKind::Run,
        EvidenceKind::Workspace,
        EvidenceKind::Model,
        EvidenceKind::SchedulerJob,
        EvidenceKind::Project,
        EvidenceKind::Organization,
        EvidenceKind::AppVersion,
    ];

    /// Config-type evidence reflects current configuration and proves use
    /// regardless of any recency window.
    pub fn is_config(self) -> bool {
        matches!(
            self,
            EvidenceKind::SchedulerJob
                | EvidenceKind::Project
                | EvidenceKind::Organization
                | EvidenceKind::AppVersion
        )
    }

    pub fn is_activity(self) -> bool {
        !self.is_config()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EvidenceKind::Run => "run",
            EvidenceKind::Workspace => "workspace",
            EvidenceKind::Model => "model",
            EvidenceKind::SchedulerJob => "scheduler_job",
            EvidenceKind::Project => "project",
            EvidenceKind::Organization => "organization",
            EvidenceKind::AppVersion => "app_version",
        }
    }

    /// Counted phrase for summaries, e.g. "2 executions".
    pub(crate) fn describe(self, count: usize) -> String {
        let plural = if count == 1 { "" } else { "s" };
        match self {
            EvidenceKind::Run => format!("{count} execution{plural}"),
            EvidenceKind::Workspace => format!("{count} workspace{plural}"),
            EvidenceKind::Model => format!("{count} model{plural}"),
            EvidenceKind::SchedulerJob => format!("{count} scheduler job{plural}"),
            EvidenceKind::Project => format!("{count} project{plural} using as default"),
            EvidenceKind::Organization => {
                format!("{count} organization{plural} using as default")
            }
            EvidenceKind::AppVersion => format!("{count} app version{plural}"),
        }
    }
}

impl fmt::Display for EvidenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Timestamps an activity record may carry. Config records have none.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ActivityTimestamps {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_used: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace_last_change: Option<DateTime<Utc>>,
}

/// One piece of evidence that something references a tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UsageRecord {
    pub kind: EvidenceKind,
    pub tag: String,
    pub record_id: String,
    /// Which workspace field referenced the tag (`environment`, `session`, ...).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub timestamps: ActivityTimestamps,
}

impl UsageRecord {
    /// Most recent usage this record proves.
    ///
    /// Runs and models prefer `last_used`, then `completed`, then `started`;
    /// workspaces use `workspace_last_change`. Config records yield `None`.
    pub fn most_recent(&self) -> Option<DateTime<Utc>> {
        match self.kind {
            EvidenceKind::Run | EvidenceKind::Model => self
                .timestamps
                .last_used
                .or(self.timestamps.completed)
                .or(self.timestamps.started),
            EvidenceKind::Workspace => self.timestamps.workspace_last_change,
            _ => None,
        }
    }
}

/// Workspace fields that may reference a tag, with their usage type.
const WORKSPACE_TAG_FIELDS: [(&str, &str); 5] = [
    ("environment_docker_tag", "environment"),
    ("project_default_environment_docker_tag", "project_default"),
    ("compute_environment_docker_tag", "compute_cluster"),
    ("session_environment_docker_tag", "session"),
    ("session_compute_environment_docker_tag", "session_compute"),
];

const TAG_FIELD: &str = "environment_docker_tag";

/// Raw query results, one list per source.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct EvidenceBundle {
    #[serde(default)]
    pub runs: Vec<Value>,
    #[serde(default)]
    pub workspaces: Vec<Value>,
    #[serde(default)]
    pub models: Vec<Value>,
    #[serde(default)]
    pub scheduler_jobs: Vec<Value>,
    #[serde(default)]
    pub projects: Vec<Value>,
    #[serde(default)]
    pub organizations: Vec<Value>,
    #[serde(default)]
    pub app_versions: Vec<Value>,
}

impl EvidenceBundle {
    pub fn from_json_str(input: &str) -> Result<Self, EvidenceError> {
        Ok(serde_json::from_str(input)?)
    }

    pub fn load(path: &Path) -> Result<Self, EvidenceError> {
        let content = std::fs::read_to_string(path).map_err(|source| EvidenceError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&content)
    }

    pub fn is_empty(&self) -> bool {
        self.total_documents() == 0
    }

    pub fn total_documents(&self) -> usize {
        EvidenceKind::ALL
            .iter()
            .map(|&kind| self.documents(kind).len())
            .sum()
    }

    fn documents(&self, kind: EvidenceKind) -> &[Value] {
        match kind {
            EvidenceKind::Run => &self.runs,
            EvidenceKind::Workspace => &self.workspaces,
            EvidenceKind::Model => &self.models,
            EvidenceKind::SchedulerJob => &self.scheduler_jobs,
            EvidenceKind::Project => &self.projects,
            EvidenceKind::Organization => &self.organizations,
            EvidenceKind::AppVersion => &self.app_versions,
        }
    }

    /// Flatten every document into usage records. Documents without a tag
    /// reference produce nothing; a workspace yields one record per tag field.
    pub fn records(&self) -> Vec<UsageRecord> {
        let mut records = Vec::new();
        for kind in EvidenceKind::ALL {
            for doc in self.documents(kind) {
                let Some(doc) = doc.as_object() else {
                    tracing::debug!("skipping non-object {} document", kind);
                    continue;
                };
                match kind {
                    EvidenceKind::Workspace => workspace_records(doc, &mut records),
                    _ => {
                        if let Some(record) = single_record(kind, doc) {
                            records.push(record);
                        }
                    }
                }
            }
        }
        records
    }
}

fn single_record(kind: EvidenceKind, doc: &Map<String, Value>) -> Option<UsageRecord> {
    let tag = non_empty_str(doc, TAG_FIELD)?;
    let (id_fields, name_fields): (&[&str], &[&str]) = match kind {
        EvidenceKind::Run => (&["run_id", "_id"], &["project_name"]),
        EvidenceKind::Model => (&["model_id", "_id"], &["model_name"]),
        EvidenceKind::SchedulerJob => (&["job_id", "_id"], &["job_name"]),
        EvidenceKind::Project => (&["project_id", "_id"], &["project_name"]),
        EvidenceKind::Organization => (&["organization_id", "_id"], &["organization_name"]),
        EvidenceKind::AppVersion => (&["app_version_id", "_id"], &["app_id"]),
        EvidenceKind::Workspace => (&["workspace_id", "_id"], &["workspace_name"]),
    };

    let timestamps = if kind.is_activity() {
        ActivityTimestamps {
            started: first_timestamp(doc, &["started", "any_started"]),
            completed: first_timestamp(doc, &["completed", "any_completed"]),
            last_used: first_timestamp(doc, &["last_used"]),
            workspace_last_change: None,
        }
    } else {
        ActivityTimestamps::default()
    };

    Some(UsageRecord {
        kind,
        tag,
        record_id: first_id(doc, id_fields),
        usage_type: None,
        name: name_fields.iter().find_map(|f| id_string(doc.get(*f)?)),
        timestamps,
    })
}

fn workspace_records(doc: &Map<String, Value>, out: &mut Vec<UsageRecord>) {
    let record_id = first_id(doc, &["workspace_id", "_id"]);
    let name = doc.get("workspace_name").and_then(id_string);
    let last_change = doc.get("workspace_last_change").and_then(parse_timestamp);

    for (field, usage_type) in WORKSPACE_TAG_FIELDS {
        if let Some(tag) = non_empty_str(doc, field) {
            out.push(UsageRecord {
                kind: EvidenceKind::Workspace,
                tag,
                record_id: record_id.clone(),
                usage_type: Some(usage_type.to_string()),
                name: name.clone(),
                timestamps: ActivityTimestamps {
                    workspace_last_change: last_change,
                    ..ActivityTimestamps::default()
                },
            });
        }
    }
}

fn non_empty_str(doc: &Map<String, Value>, field: &str) -> Option<String> {
    doc.get(field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn first_timestamp(doc: &Map<String, Value>, fields: &[&str]) -> Option<DateTime<Utc>> {
    fields
        .iter()
        .find_map(|f| doc.get(*f).and_then(parse_timestamp))
}

fn first_id(doc: &Map<String, Value>, fields: &[&str]) -> String {
    fields
        .iter()
        .find_map(|f| doc.get(*f).and_then(id_string))
        .unwrap_or_else(|| "unknown".to_string())
}

/// Render an identifier that may be a string, number, or `{"$oid": ..}`.
fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Object(map) => map.get("$oid").and_then(id_string),
        _ => None,
    }
}
