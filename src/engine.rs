//! Batch quality engine.
//!
//! Runs the record validator over a batch and aggregates findings into a
//! deterministic [`QualityReport`].
//!
//! # Scoring
//!
//! `score = 100 * (1 - weighted_findings / weighted_checks)`, clamped
//! to 0-100, where `weighted_findings` sums the configured severity
//! weights over all findings and `weighted_checks` sums the weight of
//! every rule evaluation that actually ran, at the severity it would
//! fire at. A failing check contributes the same weight to both sides,
//! so more weighted findings never raise the score. Default weights:
//!
//! - **Critical (1.0x)**: data integrity failures
//! - **Warning (0.3x)**: should be fixed before downstream use
//! - **Info (0.05x)**: informational
//!
//! A batch with no findings scores 100; a record whose every executed
//! check fails at critical severity contributes 0.
//!
//! # Determinism
//!
//! Identical batch, rules, weights, and as-of date always produce a
//! byte-identical serialized report: validation is embarrassingly
//! parallel across records, each record carries its stable input index,
//! and findings are sorted by (record index, rule declaration order)
//! before the report is assembled. The engine never reads the system
//! clock or any entropy source.
//!
//! # Example
//!
//! ```
//! use chrono::NaiveDate;
//! use depurar::{QualityEngine, Record, SchemaKind};
//!
//! let batch = vec![Record::new()
//!     .with("claim_id", "CLM001234567890")
//!     .with("member_id", "M123456789")
//!     .with("provider_npi", "1234567893")
//!     .with("diagnosis_code", "Z00.00")
//!     .with("procedure_code", "99213")
//!     .with("date_of_service", "2023-06-15")
//!     .with("claim_amount", 125.50)
//!     .with("place_of_service", "11")];
//!
//! let as_of = NaiveDate::from_ymd_opt(2023, 7, 1).unwrap();
//! let report = QualityEngine::new()
//!     .score(&batch, SchemaKind::Claim, as_of)
//!     .unwrap();
//! assert_eq!(report.score, 100.0);
//! ```

use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering},
        mpsc, Arc,
    },
    thread,
};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    record::{Record, SchemaKind},
    report::{Finding, QualityReport, SeverityCounts},
    rules::{RuleSet, Severity},
    validator::{RecordOutcome, RecordValidator},
};

/// Per-severity weights used by the aggregate score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeverityWeights {
    /// Weight of a critical finding.
    pub critical: f64,
    /// Weight of a warning finding.
    pub warning: f64,
    /// Weight of an informational finding.
    pub info: f64,
}

impl Default for SeverityWeights {
    fn default() -> Self {
        Self {
            critical: 1.0,
            warning: 0.3,
            info: 0.05,
        }
    }
}

impl SeverityWeights {
    /// Weight for one severity level.
    pub fn get(&self, severity: Severity) -> f64 {
        match severity {
            Severity::Critical => self.critical,
            Severity::Warning => self.warning,
            Severity::Info => self.info,
        }
    }

    /// Validates the configuration.
    ///
    /// Weights must be finite and non-negative, and at least one must be
    /// positive (an all-zero table cannot discriminate anything).
    fn validate(&self) -> Result<()> {
        let all = [self.critical, self.warning, self.info];
        if all.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(Error::invalid_config(format!(
                "severity weights must be finite and non-negative, got {self:?}"
            )));
        }
        if all.iter().all(|w| *w <= 0.0) {
            return Err(Error::invalid_config(
                "at least one severity weight must be positive",
            ));
        }
        Ok(())
    }

    /// Severity-weighted capacity of a set of executed checks.
    #[allow(clippy::cast_precision_loss)]
    fn capacity(&self, counts: &SeverityCounts) -> f64 {
        self.critical * counts.critical as f64
            + self.warning * counts.warning as f64
            + self.info * counts.info as f64
    }
}

/// Cooperative cancellation signal, polled between records.
///
/// Cloning shares the same signal. [`CancelToken::after_records`] builds
/// a token that trips on its own after a fixed number of records, which
/// bounds the work of a run without racing a clock.
#[derive(Debug, Clone)]
pub struct CancelToken {
    inner: Arc<TokenInner>,
}

#[derive(Debug)]
struct TokenInner {
    cancelled: AtomicBool,
    budget: AtomicI64,
}

impl CancelToken {
    /// Creates a token that never trips on its own.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(TokenInner {
                cancelled: AtomicBool::new(false),
                budget: AtomicI64::new(i64::MAX),
            }),
        }
    }

    /// Creates a token that trips after `records` records have started.
    pub fn after_records(records: usize) -> Self {
        Self {
            inner: Arc::new(TokenInner {
                cancelled: AtomicBool::new(false),
                budget: AtomicI64::new(i64::try_from(records).unwrap_or(i64::MAX)),
            }),
        }
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
    }

    /// Returns true if cancellation has been requested or the budget is
    /// exhausted. Does not consume budget.
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
            || self.inner.budget.load(Ordering::SeqCst) <= 0
    }

    /// Consumes one unit of budget; returns true if the run must stop
    /// before the next record.
    fn poll_stop(&self) -> bool {
        if self.inner.cancelled.load(Ordering::SeqCst) {
            return true;
        }
        self.inner.budget.fetch_sub(1, Ordering::SeqCst) <= 0
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Batch quality engine with configurable weights, alert threshold, and
/// worker count.
#[derive(Debug, Clone)]
pub struct QualityEngine {
    rules: RuleSet,
    weights: SeverityWeights,
    alert_threshold: Severity,
    num_workers: usize,
}

impl Default for QualityEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl QualityEngine {
    /// Creates an engine with the built-in healthcare rules, default
    /// weights, a Critical alert threshold, and inline execution.
    pub fn new() -> Self {
        Self {
            rules: RuleSet::healthcare(),
            weights: SeverityWeights::default(),
            alert_threshold: Severity::Critical,
            num_workers: 0,
        }
    }

    /// Replaces the rule set.
    #[must_use]
    pub fn rules(mut self, rules: RuleSet) -> Self {
        self.rules = rules;
        self
    }

    /// Sets the severity weights.
    #[must_use]
    pub fn weights(mut self, weights: SeverityWeights) -> Self {
        self.weights = weights;
        self
    }

    /// Sets the minimum severity that raises an alert.
    #[must_use]
    pub fn alert_threshold(mut self, threshold: Severity) -> Self {
        self.alert_threshold = threshold;
        self
    }

    /// Sets the number of worker threads (0 = run inline).
    #[must_use]
    pub fn num_workers(mut self, workers: usize) -> Self {
        self.num_workers = workers;
        self
    }

    /// Scores a batch of records of the given kind.
    ///
    /// `as_of` is the evaluation date injected into every date-sensitive
    /// rule. Invalid configuration is rejected before any record is
    /// processed; bad data never makes this fail.
    pub fn score(
        &self,
        batch: &[Record],
        kind: SchemaKind,
        as_of: NaiveDate,
    ) -> Result<QualityReport> {
        self.score_with_cancel(batch, kind, as_of, &CancelToken::new())
    }

    /// Scores a batch with a cancellation token.
    ///
    /// The token is polled between records. On cancellation the report
    /// covers the records completed so far and `cancelled` is true; no
    /// record-level result is ever partial.
    pub fn score_with_cancel(
        &self,
        batch: &[Record],
        kind: SchemaKind,
        as_of: NaiveDate,
        token: &CancelToken,
    ) -> Result<QualityReport> {
        self.weights.validate()?;

        let (mut outcomes, cancelled) = if self.num_workers == 0 {
            self.run_inline(batch, kind, as_of, token)
        } else {
            self.run_workers(batch, kind, as_of, token)
        };

        outcomes.sort_by_key(|(index, _)| *index);
        Ok(self.assemble(outcomes, cancelled))
    }

    fn run_inline(
        &self,
        batch: &[Record],
        kind: SchemaKind,
        as_of: NaiveDate,
        token: &CancelToken,
    ) -> (Vec<(usize, RecordOutcome)>, bool) {
        let validator = RecordValidator::new(&self.rules, kind, as_of);
        let mut outcomes = Vec::with_capacity(batch.len());

        for (index, record) in batch.iter().enumerate() {
            if token.poll_stop() {
                return (outcomes, true);
            }
            outcomes.push((index, validator.validate(record, index)));
        }
        (outcomes, false)
    }

    fn run_workers(
        &self,
        batch: &[Record],
        kind: SchemaKind,
        as_of: NaiveDate,
        token: &CancelToken,
    ) -> (Vec<(usize, RecordOutcome)>, bool) {
        let cursor = AtomicUsize::new(0);
        let tripped = AtomicBool::new(false);
        let (tx, rx) = mpsc::channel::<(usize, RecordOutcome)>();
        let mut outcomes = Vec::with_capacity(batch.len());

        thread::scope(|scope| {
            for _ in 0..self.num_workers {
                let tx = tx.clone();
                let cursor = &cursor;
                let tripped = &tripped;
                scope.spawn(move || {
                    let validator = RecordValidator::new(&self.rules, kind, as_of);
                    loop {
                        let index = cursor.fetch_add(1, Ordering::SeqCst);
                        if index >= batch.len() {
                            break;
                        }
                        if token.poll_stop() {
                            tripped.store(true, Ordering::SeqCst);
                            break;
                        }
                        let outcome = validator.validate(&batch[index], index);
                        if tx.send((index, outcome)).is_err() {
                            break;
                        }
                    }
                });
            }
            drop(tx);

            // Append-only collection keyed by record index; ordering is
            // restored by the caller's sort.
            for item in rx {
                outcomes.push(item);
            }
        });

        (outcomes, tripped.load(Ordering::SeqCst))
    }

    fn assemble(&self, outcomes: Vec<(usize, RecordOutcome)>, cancelled: bool) -> QualityReport {
        let total_records = outcomes.len();
        let mut checks_performed = 0;
        let mut capacity = 0.0;
        let mut severity_counts = SeverityCounts::default();
        let mut findings = Vec::new();

        for (_, outcome) in outcomes {
            checks_performed += outcome.checks_performed;
            capacity += self.weights.capacity(&outcome.checks_by_severity);
            for finding in outcome.findings {
                severity_counts.record(finding.severity);
                findings.push(finding);
            }
        }

        let weighted: f64 = findings
            .iter()
            .map(|f| self.weights.get(f.severity))
            .sum();

        let score = if capacity <= 0.0 {
            100.0
        } else {
            (100.0 * (1.0 - weighted / capacity)).clamp(0.0, 100.0)
        };

        let mut seen = HashSet::new();
        let alerts: Vec<Finding> = findings
            .iter()
            .filter(|f| f.severity >= self.alert_threshold)
            .filter(|f| seen.insert((f.rule_id.clone(), f.record_index)))
            .cloned()
            .collect();

        QualityReport {
            total_records,
            checks_performed,
            score,
            severity_counts,
            findings,
            alerts,
            cancelled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::FieldValue;

    fn as_of() -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 7, 1).unwrap()
    }

    fn valid_claim() -> Record {
        Record::new()
            .with("claim_id", "CLM001234567890")
            .with("member_id", "M123456789")
            .with("provider_npi", "1234567893")
            .with("diagnosis_code", "Z00.00")
            .with("procedure_code", "99213")
            .with("date_of_service", "2023-06-15")
            .with("claim_amount", 125.50)
            .with("place_of_service", "11")
    }

    fn broken_claim() -> Record {
        Record::new()
            .with("claim_id", FieldValue::Null)
            .with("member_id", FieldValue::Null)
            .with("provider_npi", "1234567890")
            .with("diagnosis_code", "INVALID")
            .with("procedure_code", FieldValue::Null)
            .with("date_of_service", "2025-01-01")
            .with("claim_amount", -50.0)
    }

    #[test]
    fn test_all_valid_batch_scores_100() {
        let batch = vec![valid_claim(); 4];
        let report = QualityEngine::new()
            .score(&batch, SchemaKind::Claim, as_of())
            .unwrap();

        assert_eq!(report.total_records, 4);
        assert_eq!(report.score, 100.0);
        assert_eq!(report.severity_counts.total(), 0);
        assert!(report.alerts.is_empty());
        assert!(!report.cancelled);
    }

    #[test]
    fn test_empty_batch_scores_100() {
        let report = QualityEngine::new()
            .score(&[], SchemaKind::Claim, as_of())
            .unwrap();
        assert_eq!(report.total_records, 0);
        assert_eq!(report.score, 100.0);
    }

    #[test]
    fn test_broken_batch_raises_alerts() {
        let batch = vec![broken_claim(); 2];
        let report = QualityEngine::new()
            .score(&batch, SchemaKind::Claim, as_of())
            .unwrap();

        assert!(report.score < 50.0, "score {}", report.score);
        assert!(report.severity_counts.critical > 0);
        assert!(!report.alerts.is_empty());
        // Alerts deduplicate on (rule, record): every pair is unique.
        let mut seen = HashSet::new();
        for alert in &report.alerts {
            assert!(seen.insert((alert.rule_id.clone(), alert.record_index)));
        }
    }

    #[test]
    fn test_score_monotone_in_findings() {
        let mut scores = Vec::new();
        for bad in 0..=4usize {
            let mut batch = vec![valid_claim(); 4];
            for record in batch.iter_mut().take(bad) {
                *record = valid_claim().with("provider_npi", "1234567890");
            }
            let report = QualityEngine::new()
                .score(&batch, SchemaKind::Claim, as_of())
                .unwrap();
            scores.push(report.score);
        }
        for pair in scores.windows(2) {
            assert!(pair[1] < pair[0], "scores not decreasing: {scores:?}");
        }
    }

    #[test]
    fn test_failing_optional_field_lowers_score() {
        // A low-severity failure on a previously-absent field adds a
        // finding and an executed check at once; the score must still
        // go down.
        let without_pos = Record::new()
            .with("claim_id", FieldValue::Null)
            .with("member_id", "M123456789")
            .with("provider_npi", "1234567893")
            .with("diagnosis_code", "Z00.00")
            .with("procedure_code", "99213")
            .with("date_of_service", "2023-06-15")
            .with("claim_amount", 125.50);
        let with_bad_pos = without_pos.clone().with("place_of_service", "XX");

        let engine = QualityEngine::new();
        let before = engine
            .score(&[without_pos], SchemaKind::Claim, as_of())
            .unwrap();
        let after = engine
            .score(&[with_bad_pos], SchemaKind::Claim, as_of())
            .unwrap();

        assert_eq!(before.severity_counts.total(), 1);
        assert_eq!(after.severity_counts.total(), 2);
        assert!(
            after.score < before.score,
            "score rose from {} to {}",
            before.score,
            after.score
        );
    }

    #[test]
    fn test_custom_rule_set_flows_through_engine() {
        use regex::Regex;

        use crate::rules::{FieldCheck, FieldRule, KindRules, HCPCS_PATTERN};

        let claim = KindRules {
            field_rules: vec![
                FieldRule::new(
                    "procedure_code_required",
                    "procedure_code",
                    Severity::Critical,
                    FieldCheck::Presence,
                ),
                FieldRule::new(
                    "hcpcs_format",
                    "procedure_code",
                    Severity::Critical,
                    FieldCheck::Hcpcs {
                        pattern: Regex::new(HCPCS_PATTERN).unwrap(),
                    },
                ),
            ],
            cross_rules: vec![],
        };
        let rules = RuleSet::new(claim, KindRules::default(), KindRules::default());

        let batch = vec![
            Record::new().with("procedure_code", "J1100"),
            Record::new().with("procedure_code", "99213"),
        ];
        let report = QualityEngine::new()
            .rules(rules)
            .score(&batch, SchemaKind::Claim, as_of())
            .unwrap();

        assert!(report.record_findings(0).is_empty());
        let findings = report.record_findings(1);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].rule_id, "hcpcs_format");
        assert_eq!(report.checks_performed, 4);
    }

    #[test]
    fn test_negative_weights_rejected() {
        let err = QualityEngine::new()
            .weights(SeverityWeights {
                critical: -1.0,
                ..SeverityWeights::default()
            })
            .score(&[valid_claim()], SchemaKind::Claim, as_of())
            .unwrap_err();
        assert!(matches!(err, Error::InvalidConfig { .. }));
    }

    #[test]
    fn test_all_zero_weights_rejected() {
        let err = QualityEngine::new()
            .weights(SeverityWeights {
                critical: 0.0,
                warning: 0.0,
                info: 0.0,
            })
            .score(&[valid_claim()], SchemaKind::Claim, as_of())
            .unwrap_err();
        assert!(matches!(err, Error::InvalidConfig { .. }));
    }

    #[test]
    fn test_warning_threshold_widens_alerts() {
        let batch = vec![valid_claim().with("member_id", "NOT_A_MEMBER_ID")];

        let critical_only = QualityEngine::new()
            .score(&batch, SchemaKind::Claim, as_of())
            .unwrap();
        assert!(critical_only.alerts.is_empty());

        let warnings_too = QualityEngine::new()
            .alert_threshold(Severity::Warning)
            .score(&batch, SchemaKind::Claim, as_of())
            .unwrap();
        assert_eq!(warnings_too.alerts.len(), 1);
        assert_eq!(warnings_too.alerts[0].rule_id, "member_id_format");
    }

    #[test]
    fn test_cancel_after_n_records() {
        let batch = vec![valid_claim(); 10];
        let token = CancelToken::after_records(4);
        let report = QualityEngine::new()
            .score_with_cancel(&batch, SchemaKind::Claim, as_of(), &token)
            .unwrap();

        assert!(report.cancelled);
        assert_eq!(report.total_records, 4);
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_budget_covering_whole_batch_does_not_cancel() {
        let batch = vec![valid_claim(); 3];
        let token = CancelToken::after_records(3);
        let report = QualityEngine::new()
            .score_with_cancel(&batch, SchemaKind::Claim, as_of(), &token)
            .unwrap();

        assert!(!report.cancelled);
        assert_eq!(report.total_records, 3);
    }

    #[test]
    fn test_pre_cancelled_token_yields_empty_report() {
        let token = CancelToken::new();
        token.cancel();
        let report = QualityEngine::new()
            .score_with_cancel(&[valid_claim()], SchemaKind::Claim, as_of(), &token)
            .unwrap();

        assert!(report.cancelled);
        assert_eq!(report.total_records, 0);
        assert!(report.findings.is_empty());
    }

    #[test]
    fn test_worker_count_does_not_change_report() {
        let mut batch = Vec::new();
        for i in 0..40 {
            batch.push(if i % 3 == 0 {
                broken_claim()
            } else {
                valid_claim()
            });
        }

        let inline = QualityEngine::new()
            .score(&batch, SchemaKind::Claim, as_of())
            .unwrap();
        for workers in [1, 2, 4, 8] {
            let parallel = QualityEngine::new()
                .num_workers(workers)
                .score(&batch, SchemaKind::Claim, as_of())
                .unwrap();
            assert_eq!(parallel, inline, "workers = {workers}");
        }
    }

    #[test]
    fn test_idempotent_byte_identical_reports() {
        let batch = vec![valid_claim(), broken_claim()];
        let engine = QualityEngine::new();

        let first = engine.score(&batch, SchemaKind::Claim, as_of()).unwrap();
        let second = engine.score(&batch, SchemaKind::Claim, as_of()).unwrap();
        assert_eq!(
            first.to_json().unwrap(),
            second.to_json().unwrap()
        );
    }
}
