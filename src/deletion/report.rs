// ABOUTME: JSON deletion report and human-readable byte sizes.
// ABOUTME: Written before any destructive step so every run leaves an audit trail.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use snafu::ResultExt;

use super::analysis::{DeletionAnalysis, ImageStatus};
use super::error::{DeletionError, SerializeReportSnafu, WriteReportSnafu};
use crate::usage::UsageReason;

/// Format bytes with binary units, e.g. `1.5GiB`.
pub fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 7] = ["", "Ki", "Mi", "Gi", "Ti", "Pi", "Ei"];
    let mut value = bytes as f64;
    for unit in UNITS {
        if value < 1024.0 {
            return format!("{value:.1}{unit}B");
        }
        value /= 1024.0;
    }
    format!("{value:.1}ZiB")
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportSummary {
    pub total_images_analyzed: usize,
    pub used_images: usize,
    pub unused_images: usize,
    pub total_size_saved: u64,
    pub total_size_saved_human: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportImage {
    pub image_type: String,
    pub tag: String,
    pub size: u64,
    pub size_human: String,
    pub total_size: u64,
    pub status: ImageStatus,
    pub reason: UsageReason,
    pub evidence: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub most_recent_use: Option<DateTime<Utc>>,
}

/// The document written for each analysis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeletionReport {
    pub generated_at: DateTime<Utc>,
    pub dry_run: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unused_since_days: Option<u32>,
    pub summary: ReportSummary,
    pub images: Vec<ReportImage>,
}

impl DeletionReport {
    pub fn new(
        analysis: &DeletionAnalysis,
        dry_run: bool,
        unused_since_days: Option<u32>,
        generated_at: DateTime<Utc>,
    ) -> Self {
        let images = analysis
            .stats
            .values()
            .map(|stats| ReportImage {
                image_type: stats.image.image_type().to_string(),
                tag: stats.image.tag().to_string(),
                size: stats.size,
                size_human: human_size(stats.size),
                total_size: stats.total_size,
                status: stats.status,
                reason: stats.reason,
                evidence: stats.evidence.clone(),
                most_recent_use: stats.most_recent_use,
            })
            .collect();

        Self {
            generated_at,
            dry_run,
            unused_since_days,
            summary: ReportSummary {
                total_images_analyzed: analysis.total_images(),
                used_images: analysis.used_images.len(),
                unused_images: analysis.unused_images.len(),
                total_size_saved: analysis.total_size_saved,
                total_size_saved_human: human_size(analysis.total_size_saved),
            },
            images,
        }
    }

    /// Write to `<dir>/deletion-analysis-<timestamp>.json`, creating `dir`.
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf, DeletionError> {
        std::fs::create_dir_all(dir).context(WriteReportSnafu { path: dir })?;
        let json = serde_json::to_vec_pretty(self).context(SerializeReportSnafu)?;
        let stamp = self.generated_at.format("%Y-%m-%d-%H-%M-%S-%6f");

        // Never overwrite an earlier run's report.
        let mut attempt = 0u32;
        loop {
            let name = match attempt {
                0 => format!("deletion-analysis-{stamp}.json"),
                n => format!("deletion-analysis-{stamp}-{n}.json"),
            };
            let path = dir.join(name);
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    file.write_all(&json)
                        .context(WriteReportSnafu { path: &path })?;
                    return Ok(path);
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => attempt += 1,
                Err(source) => return Err(DeletionError::WriteReport { path, source }),
            }
        }
    }
}
