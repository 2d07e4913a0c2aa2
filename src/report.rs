//! Report model: findings and the aggregated quality report.
//!
//! Pure data containers with JSON round-trip fidelity:
//! `QualityReport::from_json(&report.to_json()?)? == report`.

use serde::{Deserialize, Serialize};

use crate::{
    error::Result,
    rules::{RuleCode, Severity},
};

/// One rule violation recorded against a record.
///
/// Findings are created by the record validator and never mutated. The
/// record is identified by its stable input index within the batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    /// Index of the record within the input batch.
    pub record_index: usize,
    /// The field involved, or `None` for cross-field rules.
    pub field: Option<String>,
    /// Identifier of the rule that fired.
    pub rule_id: String,
    /// Finding taxonomy code.
    pub code: RuleCode,
    /// Severity of the violation.
    pub severity: Severity,
    /// Human-readable message.
    pub message: String,
}

/// Finding counts per severity level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    /// Number of critical findings.
    #[serde(rename = "CRITICAL")]
    pub critical: usize,
    /// Number of warning findings.
    #[serde(rename = "WARNING")]
    pub warning: usize,
    /// Number of informational findings.
    #[serde(rename = "INFO")]
    pub info: usize,
}

impl SeverityCounts {
    /// Increments the count for a severity.
    pub fn record(&mut self, severity: Severity) {
        match severity {
            Severity::Critical => self.critical += 1,
            Severity::Warning => self.warning += 1,
            Severity::Info => self.info += 1,
        }
    }

    /// Count for one severity level.
    pub fn get(&self, severity: Severity) -> usize {
        match severity {
            Severity::Critical => self.critical,
            Severity::Warning => self.warning,
            Severity::Info => self.info,
        }
    }

    /// Total findings across all severities.
    pub fn total(&self) -> usize {
        self.critical + self.warning + self.info
    }
}

/// Aggregated quality assessment for one batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    /// Number of records validated. Under cancellation this is the
    /// number of records completed, not the batch size.
    pub total_records: usize,
    /// Number of rule evaluations that actually ran.
    pub checks_performed: usize,
    /// Aggregate quality score, 0-100.
    pub score: f64,
    /// Finding counts per severity.
    pub severity_counts: SeverityCounts,
    /// All findings, sorted by (record index, rule declaration order).
    pub findings: Vec<Finding>,
    /// Findings at or above the alert threshold, deduplicated by
    /// (rule id, record index).
    pub alerts: Vec<Finding>,
    /// True if the run was cancelled before covering the whole batch.
    pub cancelled: bool,
}

impl QualityReport {
    /// Returns true if any findings were recorded.
    pub fn has_findings(&self) -> bool {
        !self.findings.is_empty()
    }

    /// Findings recorded against one record.
    pub fn record_findings(&self, record_index: usize) -> Vec<&Finding> {
        self.findings
            .iter()
            .filter(|f| f.record_index == record_index)
            .collect()
    }

    /// Highest severity among all findings, if any.
    pub fn max_severity(&self) -> Option<Severity> {
        self.findings.iter().map(|f| f.severity).max()
    }

    /// Serialize to JSON bytes.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Deserialize from JSON bytes.
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
