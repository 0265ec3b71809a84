// ✅ Data Quality Log - Every lookup that degraded instead of failing
//
// Protocol, status, category and country gaps do not stop a batch: the value
// falls back to `unknown`/null and the gap is recorded here, logged, and
// summarized in the batch report.

use crate::registry::Registry;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, warn};

// ============================================================================
// SEVERITY
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical, // Value could not be harmonized and was dropped
    Warning,  // Value degraded to unknown/null
    Info,     // Value passed through unchanged or was adjusted
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::Warning => "warning",
            Severity::Info => "info",
        }
    }
}

// ============================================================================
// QUALITY ISSUE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityIssue {
    pub severity: Severity,
    pub registry: Registry,

    /// Source row, when the issue belongs to one
    pub row: Option<usize>,

    pub project_id: Option<String>,
    pub field: String,

    /// Offending raw value
    pub value: Option<String>,

    pub issue: String,
}

impl QualityIssue {
    pub fn new(severity: Severity, registry: Registry, field: &str, issue: impl Into<String>) -> Self {
        QualityIssue {
            severity,
            registry,
            row: None,
            project_id: None,
            field: field.to_string(),
            value: None,
            issue: issue.into(),
        }
    }

    pub fn warning(registry: Registry, field: &str, issue: impl Into<String>) -> Self {
        Self::new(Severity::Warning, registry, field, issue)
    }

    pub fn info(registry: Registry, field: &str, issue: impl Into<String>) -> Self {
        Self::new(Severity::Info, registry, field, issue)
    }

    /// Builder: attach source row
    pub fn with_row(mut self, row: usize) -> Self {
        self.row = Some(row);
        self
    }

    /// Builder: attach project id
    pub fn with_project(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    /// Builder: attach raw value
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }
}

// ============================================================================
// QUALITY LOG
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QualityLog {
    issues: Vec<QualityIssue>,
}

impl QualityLog {
    pub fn new() -> Self {
        QualityLog::default()
    }

    /// Record and log one issue
    pub fn record(&mut self, issue: QualityIssue) {
        match issue.severity {
            Severity::Critical | Severity::Warning => warn!(
                registry = %issue.registry,
                field = %issue.field,
                value = issue.value.as_deref().unwrap_or(""),
                project_id = issue.project_id.as_deref().unwrap_or(""),
                row = issue.row.unwrap_or(0),
                "{}",
                issue.issue
            ),
            Severity::Info => info!(
                registry = %issue.registry,
                field = %issue.field,
                value = issue.value.as_deref().unwrap_or(""),
                "{}",
                issue.issue
            ),
        }
        self.issues.push(issue);
    }

    pub fn extend(&mut self, other: QualityLog) {
        self.issues.extend(other.issues);
    }

    pub fn issues(&self) -> &[QualityIssue] {
        &self.issues
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.issues.iter().filter(|i| i.severity == severity).count()
    }

    /// Issue counts per severity name, for the batch report
    pub fn counts_by_severity(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for issue in &self.issues {
            *counts.entry(issue.severity.as_str().to_string()).or_insert(0) += 1;
        }
        counts
    }

    /// Issue counts per field
    pub fn counts_by_field(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for issue in &self.issues {
            *counts.entry(issue.field.clone()).or_insert(0) += 1;
        }
        counts
    }

    pub fn summary(&self) -> String {
        format!(
            "Issues: {} ({} critical, {} warnings)",
            self.issues.len(),
            self.count(Severity::Critical),
            self.count(Severity::Warning)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_builder() {
        let issue = QualityIssue::warning(Registry::Verra, "status", "status not in table")
            .with_row(12)
            .with_project("VCS75")
            .with_value("Dormant");

        assert_eq!(issue.severity, Severity::Warning);
        assert_eq!(issue.row, Some(12));
        assert_eq!(issue.value.as_deref(), Some("Dormant"));
    }

    #[test]
    fn test_counts() {
        let mut log = QualityLog::new();
        log.record(QualityIssue::warning(Registry::Verra, "protocol", "unknown protocol"));
        log.record(QualityIssue::warning(Registry::Verra, "status", "status not in table"));
        log.record(QualityIssue::info(Registry::Verra, "country", "country passed through"));

        assert_eq!(log.len(), 3);
        assert_eq!(log.count(Severity::Warning), 2);
        assert_eq!(log.counts_by_severity().get("info"), Some(&1));
        assert_eq!(log.counts_by_field().get("protocol"), Some(&1));
        assert_eq!(log.summary(), "Issues: 3 (0 critical, 2 warnings)");
    }

    #[test]
    fn test_extend_merges_logs() {
        let mut a = QualityLog::new();
        let mut b = QualityLog::new();
        b.record(QualityIssue::info(Registry::ArtTrees, "country", "passed through"));
        a.extend(b);
        assert_eq!(a.len(), 1);
        assert!(!a.is_empty());
    }
}
