//! Record validator: applies one kind's rules to one record.

use chrono::NaiveDate;

use crate::{
    record::{Record, SchemaKind},
    report::{Finding, SeverityCounts},
    rules::{CheckResult, KindRules, RuleSet, Severity},
};

/// Result of validating one record.
#[derive(Debug, Clone, Default)]
pub struct RecordOutcome {
    /// Findings in rule declaration order.
    pub findings: Vec<Finding>,
    /// Number of rule evaluations that actually ran (skips excluded).
    pub checks_performed: usize,
    /// Executed checks counted by the severity each would fire at.
    pub checks_by_severity: SeverityCounts,
}

impl RecordOutcome {
    fn count_check(&mut self, severity: Severity) {
        self.checks_performed += 1;
        self.checks_by_severity.record(severity);
    }
}

/// Applies every applicable field and cross-field rule to a record.
///
/// The validator is total over its input: malformed or missing fields
/// become findings, never panics or errors. Field rules run in schema
/// declaration order, then cross-field rules in declaration order, so
/// per-record findings come out in a stable, readable order.
#[derive(Debug, Clone)]
pub struct RecordValidator<'a> {
    rules: &'a KindRules,
    as_of: NaiveDate,
}

impl<'a> RecordValidator<'a> {
    /// Creates a validator for one record kind.
    ///
    /// `as_of` is the caller-injected evaluation date used by every
    /// date-sensitive rule; the validator never reads the system clock.
    pub fn new(rule_set: &'a RuleSet, kind: SchemaKind, as_of: NaiveDate) -> Self {
        Self {
            rules: rule_set.rules_for(kind),
            as_of,
        }
    }

    /// Validates one record, identified by its stable batch index.
    pub fn validate(&self, record: &Record, record_index: usize) -> RecordOutcome {
        let mut outcome = RecordOutcome::default();

        for rule in &self.rules.field_rules {
            match rule.apply(record, self.as_of) {
                CheckResult::Skipped => {}
                CheckResult::Passed => outcome.count_check(rule.severity),
                CheckResult::Failed(violation) => {
                    outcome.count_check(rule.severity);
                    outcome.findings.push(Finding {
                        record_index,
                        field: Some(rule.field.clone()),
                        rule_id: rule.id.clone(),
                        code: violation.code,
                        severity: rule.severity,
                        message: violation.message,
                    });
                }
            }
        }

        for rule in &self.rules.cross_rules {
            match rule.apply(record, self.as_of) {
                CheckResult::Skipped => {}
                CheckResult::Passed => outcome.count_check(rule.severity),
                CheckResult::Failed(violation) => {
                    outcome.count_check(rule.severity);
                    outcome.findings.push(Finding {
                        record_index,
                        field: None,
                        rule_id: rule.id.clone(),
                        code: violation.code,
                        severity: rule.severity,
                        message: violation.message,
                    });
                }
            }
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::{
        record::Record,
        rules::{RuleCode, RuleSet, Severity},
    };

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

    #[test]
    fn test_valid_claim_yields_no_findings() {
        let rules = RuleSet::healthcare();
        let validator = RecordValidator::new(&rules, SchemaKind::Claim, as_of());

        let outcome = validator.validate(&valid_claim(), 0);
        assert!(outcome.findings.is_empty(), "{:?}", outcome.findings);
        // 14 field rules + the future-date cross rule ran; the inpatient
        // cross rule skipped (no admission/discharge fields).
        assert_eq!(outcome.checks_performed, 15);
        // 13 critical checks, the member-format warning, the
        // place-of-service info check.
        assert_eq!(outcome.checks_by_severity.get(Severity::Critical), 13);
        assert_eq!(outcome.checks_by_severity.get(Severity::Warning), 1);
        assert_eq!(outcome.checks_by_severity.get(Severity::Info), 1);
    }

    #[test]
    fn test_empty_record_is_all_missing() {
        let rules = RuleSet::healthcare();
        let validator = RecordValidator::new(&rules, SchemaKind::Claim, as_of());

        let outcome = validator.validate(&Record::new(), 0);
        // Only the 7 presence rules ran; every one failed.
        assert_eq!(outcome.checks_performed, 7);
        assert_eq!(outcome.findings.len(), 7);
        assert!(outcome
            .findings
            .iter()
            .all(|f| f.code == RuleCode::MissingRequired));
    }

    #[test]
    fn test_findings_in_declaration_order() {
        let rules = RuleSet::healthcare();
        let validator = RecordValidator::new(&rules, SchemaKind::Claim, as_of());

        let record = valid_claim()
            .with("provider_npi", "1234567890") // bad checksum
            .with("date_of_service", "2024-01-01"); // future of as_of

        let outcome = validator.validate(&record, 3);
        let ids: Vec<&str> = outcome.findings.iter().map(|f| f.rule_id.as_str()).collect();
        assert_eq!(ids, vec!["npi_checksum", "service_date_not_future"]);
        assert!(outcome.findings.iter().all(|f| f.record_index == 3));
        // Field finding carries the field; cross finding does not.
        assert_eq!(outcome.findings[0].field.as_deref(), Some("provider_npi"));
        assert_eq!(outcome.findings[1].field, None);
    }

    #[test]
    fn test_member_eligibility_cross_rule() {
        let rules = RuleSet::healthcare();
        let validator = RecordValidator::new(&rules, SchemaKind::Member, as_of());

        let record = Record::new()
            .with("member_id", "M123456789")
            .with("first_name", "John")
            .with("last_name", "Doe")
            .with("date_of_birth", "1985-06-15")
            .with("eligibility_start", "2023-01-01")
            .with("eligibility_end", "2020-01-01");

        let outcome = validator.validate(&record, 0);
        assert_eq!(outcome.findings.len(), 1);
        assert_eq!(outcome.findings[0].rule_id, "eligibility_window");
        assert_eq!(outcome.findings[0].code, RuleCode::InvalidDateRange);
        assert_eq!(outcome.findings[0].severity, Severity::Critical);
    }

    #[test]
    fn test_ongoing_eligibility_passes() {
        let rules = RuleSet::healthcare();
        let validator = RecordValidator::new(&rules, SchemaKind::Member, as_of());

        let record = Record::new()
            .with("member_id", "M987654321")
            .with("first_name", "Jane")
            .with("last_name", "Smith")
            .with("date_of_birth", "1990-12-03")
            .with("eligibility_start", "2023-01-01")
            .with("eligibility_end", crate::record::FieldValue::Null);

        let outcome = validator.validate(&record, 0);
        assert!(outcome.findings.is_empty(), "{:?}", outcome.findings);
    }

    #[test]
    fn test_expired_active_license() {
        let rules = RuleSet::healthcare();
        let validator = RecordValidator::new(&rules, SchemaKind::Provider, as_of());

        let record = Record::new()
            .with("provider_npi", "1234567893")
            .with("provider_name", "Dr. John Smith, MD")
            .with("taxonomy_code", "207Q00000X")
            .with("license_number", "MD123456")
            .with("license_expiration_date", "2020-01-01")
            .with("status", "ACTIVE");

        let outcome = validator.validate(&record, 0);
        assert_eq!(outcome.findings.len(), 1);
        assert_eq!(outcome.findings[0].code, RuleCode::ExpiredLicense);

        // An inactive provider with the same dates is not flagged.
        let inactive = record.with("status", "RETIRED");
        let outcome = validator.validate(&inactive, 0);
        assert!(outcome.findings.is_empty());
    }

    #[test]
    fn test_every_finding_references_a_known_rule() {
        let rules = RuleSet::healthcare();
        let validator = RecordValidator::new(&rules, SchemaKind::Claim, as_of());

        let record = Record::new()
            .with("member_id", "INVALID_ID")
            .with("provider_npi", "123")
            .with("diagnosis_code", "INVALID")
            .with("claim_amount", -50.0);

        let outcome = validator.validate(&record, 0);
        assert!(!outcome.findings.is_empty());
        for finding in &outcome.findings {
            assert!(
                rules.contains_rule(&finding.rule_id),
                "unknown rule id {}",
                finding.rule_id
            );
        }
    }
}
