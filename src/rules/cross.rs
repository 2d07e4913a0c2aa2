//! Cross-field predicates.
//!
//! Each predicate reads multiple fields of one record. Missing or
//! unparseable inputs make the predicate skip rather than fail: the
//! field-level rules already report those problems.

use chrono::NaiveDate;

use super::{field, CheckResult, RuleCode, Violation};
use crate::record::Record;

fn date_field(record: &Record, name: &str) -> Option<NaiveDate> {
    record.text(name).and_then(field::parse_date)
}

/// Claim consistency: the service date must not lie after the
/// evaluation date.
pub(super) fn service_date_future(record: &Record, as_of: NaiveDate) -> CheckResult {
    let Some(service) = date_field(record, "date_of_service") else {
        return CheckResult::Skipped;
    };
    if service > as_of {
        CheckResult::Failed(Violation {
            code: RuleCode::FutureDate,
            message: format!("date of service {service} is after {as_of}"),
        })
    } else {
        CheckResult::Passed
    }
}

/// Member eligibility: a null end date means ongoing coverage; a set end
/// date must not precede the start.
pub(super) fn eligibility_window(record: &Record) -> CheckResult {
    if record.is_absent("eligibility_end") {
        return CheckResult::Passed;
    }
    let (Some(start), Some(end)) = (
        date_field(record, "eligibility_start"),
        date_field(record, "eligibility_end"),
    ) else {
        return CheckResult::Skipped;
    };
    if end < start {
        CheckResult::Failed(Violation {
            code: RuleCode::InvalidDateRange,
            message: format!("eligibility ends {end}, before it starts {start}"),
        })
    } else {
        CheckResult::Passed
    }
}

/// Provider license: an ACTIVE provider's license must not be expired as
/// of the evaluation date.
pub(super) fn active_license(record: &Record, as_of: NaiveDate) -> CheckResult {
    let active = record
        .text("status")
        .is_some_and(|s| s.eq_ignore_ascii_case("ACTIVE"));
    if !active {
        return CheckResult::Skipped;
    }
    let Some(expiration) = date_field(record, "license_expiration_date") else {
        return CheckResult::Skipped;
    };
    if expiration < as_of {
        CheckResult::Failed(Violation {
            code: RuleCode::ExpiredLicense,
            message: format!("license expired {expiration} but provider status is ACTIVE"),
        })
    } else {
        CheckResult::Passed
    }
}

/// Inpatient stay: discharge must not precede admission.
pub(super) fn inpatient_stay(record: &Record) -> CheckResult {
    let (Some(admission), Some(discharge)) = (
        date_field(record, "admission_date"),
        date_field(record, "discharge_date"),
    ) else {
        return CheckResult::Skipped;
    };
    if discharge < admission {
        CheckResult::Failed(Violation {
            code: RuleCode::InvalidDateRange,
            message: format!("discharged {discharge}, before admission {admission}"),
        })
    } else {
        CheckResult::Passed
    }
}
