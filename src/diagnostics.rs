// ABOUTME: Diagnostics accumulator for non-fatal problems during a sweep.
// ABOUTME: Collects warnings that degrade a run without failing it, for the final summary.

/// Collects non-fatal warnings while analyzing or deleting.
#[derive(Default)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    /// Record a warning, auto-logging it via tracing.
    pub fn warn(&mut self, warning: Warning) {
        tracing::warn!("{}", warning.message);
        self.warnings.push(warning);
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn count(&self, kind: WarningKind) -> usize {
        self.warnings.iter().filter(|w| w.kind == kind).count()
    }
}

#[derive(Debug, Clone)]
pub struct Warning {
    pub kind: WarningKind,
    pub message: String,
}

impl Warning {
    fn new(kind: WarningKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Evidence could not be read; the run continues as if there were none.
    pub fn evidence_source(message: impl Into<String>) -> Self {
        Self::new(WarningKind::EvidenceSource, message)
    }

    /// A repository's tags could not be listed; its images are left out.
    pub fn repository_skipped(message: impl Into<String>) -> Self {
        Self::new(WarningKind::RepositorySkipped, message)
    }

    /// A tag could not be inspected; it is left out of the layer graph.
    pub fn inspection_failed(message: impl Into<String>) -> Self {
        Self::new(WarningKind::InspectionFailed, message)
    }

    /// A checkpoint file was unreadable and treated as absent.
    pub fn checkpoint_corrupt(message: impl Into<String>) -> Self {
        Self::new(WarningKind::CheckpointCorrupt, message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningKind {
    EvidenceSource,
    RepositorySkipped,
    InspectionFailed,
    CheckpointCorrupt,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostics_starts_empty() {
        let diag = Diagnostics::default();
        assert!(!diag.has_warnings());
        assert!(diag.warnings().is_empty());
    }

    #[test]
    fn diagnostics_counts_by_kind() {
        let mut diag = Diagnostics::default();

        diag.warn(Warning::inspection_failed("environment:a: timeout"));
        diag.warn(Warning::inspection_failed("environment:b: timeout"));
        diag.warn(Warning::evidence_source("evidence.json: not found"));

        assert!(diag.has_warnings());
        assert_eq!(diag.count(WarningKind::InspectionFailed), 2);
        assert_eq!(diag.count(WarningKind::EvidenceSource), 1);
        assert_eq!(diag.count(WarningKind::CheckpointCorrupt), 0);
    }

    #[test]
    fn constructors_set_kind() {
        assert_eq!(
            Warning::repository_skipped("x").kind,
            WarningKind::RepositorySkipped
        );
        assert_eq!(
            Warning::checkpoint_corrupt("x").kind,
            WarningKind::CheckpointCorrupt
        );
    }
}
