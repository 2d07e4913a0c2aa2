//! Validation rules for healthcare transactional records.
//!
//! Rules come in two shapes: [`FieldRule`] (one field, one predicate) and
//! [`CrossFieldRule`] (a predicate over the whole record). Both carry a
//! severity and are collected into a [`RuleSet`], which is a plain value
//! passed into the engine at call time — there is no process-wide rule
//! registry, so parallel runs with different rule sets cannot interfere.
//!
//! [`RuleSet::healthcare`] builds the built-in Medicaid/Medicare tables
//! for claim, member, and provider records.

mod cross;
pub mod field;


use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::record::{FieldValue, Record, SchemaKind};

pub use field::Violation;

/// Severity of a rule violation, ordered from least to most severe.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    /// Informational; no action required.
    Info,
    /// Should be fixed before downstream use.
    Warning,
    /// Data integrity failure.
    Critical,
}

impl Severity {
    /// Stable uppercase name, matching the serialized form.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Critical => "CRITICAL",
        }
    }
}

/// Finding taxonomy: why a rule fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RuleCode {
    /// Value does not match the required syntax.
    FormatError,
    /// Checksum digit is wrong (NPI Luhn).
    ChecksumMismatch,
    /// Required field is null or blank.
    MissingRequired,
    /// Numeric value outside the allowed range.
    OutOfRange,
    /// Date lies after the evaluation date.
    FutureDate,
    /// Date range ends before it starts.
    InvalidDateRange,
    /// License expired while the provider is marked active.
    ExpiredLicense,
    /// Code is structurally valid but in a reserved range.
    ReservedCode,
}

/// Outcome of applying one rule to one record.
#[derive(Debug, Clone, PartialEq)]
pub enum CheckResult {
    /// The rule's inputs were absent or unusable; the rule did not run.
    /// Missing inputs are reported by the presence rules instead.
    Skipped,
    /// The rule ran and the record conforms.
    Passed,
    /// The rule ran and the record violates it.
    Failed(Violation),
}

/// Predicate applied to a single field.
#[derive(Debug, Clone)]
pub enum FieldCheck {
    /// Field must be present and non-blank.
    Presence,
    /// NPI format and Luhn checksum.
    Npi,
    /// ICD-10 diagnosis code format.
    Icd10 {
        /// Compiled structural pattern.
        pattern: Regex,
    },
    /// CPT procedure code format.
    Cpt,
    /// HCPCS Level II code format.
    Hcpcs {
        /// Compiled structural pattern.
        pattern: Regex,
    },
    /// Calendar date in an accepted format.
    Date {
        /// Also reject dates after the evaluation date.
        forbid_future: bool,
    },
    /// Member ID against state-specific and generic patterns.
    MemberId {
        /// Compiled patterns; any single match is sufficient.
        patterns: Vec<Regex>,
    },
    /// Positive numeric amount with a plausibility cap.
    Amount {
        /// Maximum accepted amount.
        max: f64,
    },
    /// Place-of-service code (01-99).
    PlaceOfService,
    /// Provider taxonomy code (10 alphanumerics).
    Taxonomy,
}

/// A single-field validation rule.
#[derive(Debug, Clone)]
pub struct FieldRule {
    /// Stable rule identifier, referenced by findings.
    pub id: String,
    /// The field the rule applies to.
    pub field: String,
    /// Severity of a violation.
    pub severity: Severity,
    /// The predicate.
    pub check: FieldCheck,
}

impl FieldRule {
    /// Creates a field rule.
    pub fn new(id: &str, field: &str, severity: Severity, check: FieldCheck) -> Self {
        Self {
            id: id.to_string(),
            field: field.to_string(),
            severity,
            check,
        }
    }

    /// Applies the rule to a record.
    ///
    /// Non-presence rules skip absent fields: the matching presence rule
    /// reports those, so one data problem yields one finding.
    pub fn apply(&self, record: &Record, as_of: NaiveDate) -> CheckResult {
        if let FieldCheck::Presence = self.check {
            return if record.is_absent(&self.field) {
                CheckResult::Failed(Violation {
                    code: RuleCode::MissingRequired,
                    message: format!("required field '{}' is missing", self.field),
                })
            } else {
                CheckResult::Passed
            };
        }

        if record.is_absent(&self.field) {
            return CheckResult::Skipped;
        }

        if let FieldCheck::Amount { max } = &self.check {
            let value = record.get(&self.field);
            let parsed = value.and_then(FieldValue::as_number);
            let raw = value.and_then(FieldValue::as_text).unwrap_or("");
            return field::amount(parsed, raw, *max).into();
        }

        // Remaining checks are textual; a bare number in an identifier
        // or code field is itself a format problem.
        let Some(text) = record.text(&self.field) else {
            return CheckResult::Failed(Violation {
                code: RuleCode::FormatError,
                message: format!("field '{}' must be text", self.field),
            });
        };

        match &self.check {
            FieldCheck::Npi => field::npi(text).into(),
            FieldCheck::Icd10 { pattern } => field::icd10(pattern, text).into(),
            FieldCheck::Cpt => field::cpt(text).into(),
            FieldCheck::Hcpcs { pattern } => field::hcpcs(pattern, text).into(),
            FieldCheck::Date { forbid_future } => field::date(text, as_of, *forbid_future).into(),
            FieldCheck::MemberId { patterns } => field::member_id(patterns, text).into(),
            FieldCheck::PlaceOfService => field::place_of_service(text).into(),
            FieldCheck::Taxonomy => field::taxonomy(text).into(),
            FieldCheck::Presence | FieldCheck::Amount { .. } => unreachable!("handled above"),
        }
    }
}

impl From<Result<(), Violation>> for CheckResult {
    fn from(result: Result<(), Violation>) -> Self {
        match result {
            Ok(()) => Self::Passed,
            Err(violation) => Self::Failed(violation),
        }
    }
}

/// Predicate applied to a whole record.
#[derive(Debug, Clone, Copy)]
pub enum CrossCheck {
    /// Claim service date must not lie after the evaluation date.
    ServiceDateFuture,
    /// Member eligibility end, when set, must not precede the start.
    EligibilityWindow,
    /// An ACTIVE provider's license must not be expired.
    ActiveLicense,
    /// Inpatient discharge must not precede admission.
    InpatientStay,
}

/// A cross-field validation rule.
#[derive(Debug, Clone)]
pub struct CrossFieldRule {
    /// Stable rule identifier, referenced by findings.
    pub id: String,
    /// The fields the predicate reads.
    pub fields: Vec<String>,
    /// Severity of a violation.
    pub severity: Severity,
    /// The predicate.
    pub check: CrossCheck,
}

impl CrossFieldRule {
    /// Creates a cross-field rule over the named fields.
    pub fn new(id: &str, fields: &[&str], severity: Severity, check: CrossCheck) -> Self {
        Self {
            id: id.to_string(),
            fields: fields.iter().map(ToString::to_string).collect(),
            severity,
            check,
        }
    }

    /// Applies the rule to a record.
    ///
    /// A rule whose inputs are missing or unparseable skips: those
    /// problems already surface as field-level findings.
    pub fn apply(&self, record: &Record, as_of: NaiveDate) -> CheckResult {
        match self.check {
            CrossCheck::ServiceDateFuture => cross::service_date_future(record, as_of),
            CrossCheck::EligibilityWindow => cross::eligibility_window(record),
            CrossCheck::ActiveLicense => cross::active_license(record, as_of),
            CrossCheck::InpatientStay => cross::inpatient_stay(record),
        }
    }
}

/// Rules for one record kind, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct KindRules {
    /// Field rules, applied first, in order.
    pub field_rules: Vec<FieldRule>,
    /// Cross-field rules, applied after, in order.
    pub cross_rules: Vec<CrossFieldRule>,
}

impl KindRules {
    /// Total number of rules declared for this kind.
    pub fn len(&self) -> usize {
        self.field_rules.len() + self.cross_rules.len()
    }

    /// Returns true if no rules are declared.
    pub fn is_empty(&self) -> bool {
        self.field_rules.is_empty() && self.cross_rules.is_empty()
    }
}

/// A complete rule configuration: one rule table per record kind.
#[derive(Debug, Clone)]
pub struct RuleSet {
    claim: KindRules,
    member: KindRules,
    provider: KindRules,
}

// Patterns below are compile-time constants; a failure to compile them is
// a bug in this table, not a runtime condition.
#[allow(clippy::expect_used)]
fn pattern(re: &str) -> Regex {
    Regex::new(re).expect("built-in rule pattern must compile")
}

/// ICD-10-CM structural pattern (decimal part optional, 1-4 alphanumerics).
pub const ICD10_PATTERN: &str = r"^[A-Z][0-9][A-Z0-9](\.[A-Z0-9]{1,4})?$";

/// HCPCS Level II: letter A-V excluding I and O, then 4 digits.
pub const HCPCS_PATTERN: &str = r"^[A-HJ-NP-V][0-9]{4}$";

/// Member ID patterns: state-specific formats first, then the generic
/// Medicaid/Medicare shapes.
pub const MEMBER_ID_PATTERNS: [&str; 6] = [
    r"^CA[0-9]{9}$",          // California
    r"^[0-9]{8}NY$",          // New York
    r"^TX[A-Z][0-9]{8}$",     // Texas
    r"^[0-9]{9,12}$",         // generic Medicaid: 9-12 digits
    r"^[A-Z]{1,3}[0-9]{6,9}$", // state prefix + digits
    r"^[A-Z][0-9]{8}[A-Z]$",  // Medicare beneficiary format
];

/// Plausibility cap on a single claim amount.
const CLAIM_AMOUNT_MAX: f64 = 1_000_000.0;

impl RuleSet {
    /// Builds a rule set from caller-supplied per-kind tables.
    pub fn new(claim: KindRules, member: KindRules, provider: KindRules) -> Self {
        Self {
            claim,
            member,
            provider,
        }
    }

    /// Builds the built-in Medicaid/Medicare rule tables.
    #[must_use]
    pub fn healthcare() -> Self {
        use Severity::{Critical, Info, Warning};

        let member_id_patterns = || {
            FieldCheck::MemberId {
                patterns: MEMBER_ID_PATTERNS.iter().map(|p| pattern(p)).collect(),
            }
        };
        let icd10 = || FieldCheck::Icd10 {
            pattern: pattern(ICD10_PATTERN),
        };

        let claim = KindRules {
            field_rules: vec![
                FieldRule::new("claim_id_required", "claim_id", Critical, FieldCheck::Presence),
                FieldRule::new("member_id_required", "member_id", Critical, FieldCheck::Presence),
                FieldRule::new("member_id_format", "member_id", Warning, member_id_patterns()),
                FieldRule::new(
                    "provider_npi_required",
                    "provider_npi",
                    Critical,
                    FieldCheck::Presence,
                ),
                FieldRule::new("npi_checksum", "provider_npi", Critical, FieldCheck::Npi),
                FieldRule::new(
                    "diagnosis_code_required",
                    "diagnosis_code",
                    Critical,
                    FieldCheck::Presence,
                ),
                FieldRule::new("icd10_format", "diagnosis_code", Critical, icd10()),
                FieldRule::new(
                    "procedure_code_required",
                    "procedure_code",
                    Critical,
                    FieldCheck::Presence,
                ),
                FieldRule::new("cpt_format", "procedure_code", Critical, FieldCheck::Cpt),
                FieldRule::new(
                    "date_of_service_required",
                    "date_of_service",
                    Critical,
                    FieldCheck::Presence,
                ),
                FieldRule::new(
                    "date_of_service_format",
                    "date_of_service",
                    Critical,
                    FieldCheck::Date {
                        forbid_future: false,
                    },
                ),
                FieldRule::new(
                    "claim_amount_required",
                    "claim_amount",
                    Critical,
                    FieldCheck::Presence,
                ),
                FieldRule::new(
                    "claim_amount_range",
                    "claim_amount",
                    Critical,
                    FieldCheck::Amount {
                        max: CLAIM_AMOUNT_MAX,
                    },
                ),
                FieldRule::new(
                    "place_of_service_format",
                    "place_of_service",
                    Info,
                    FieldCheck::PlaceOfService,
                ),
            ],
            cross_rules: vec![
                CrossFieldRule::new(
                    "service_date_not_future",
                    &["date_of_service"],
                    Critical,
                    CrossCheck::ServiceDateFuture,
                ),
                CrossFieldRule::new(
                    "inpatient_stay_order",
                    &["admission_date", "discharge_date"],
                    Warning,
                    CrossCheck::InpatientStay,
                ),
            ],
        };

        let member = KindRules {
            field_rules: vec![
                FieldRule::new("member_id_required", "member_id", Critical, FieldCheck::Presence),
                FieldRule::new("member_id_format", "member_id", Warning, member_id_patterns()),
                FieldRule::new(
                    "first_name_required",
                    "first_name",
                    Warning,
                    FieldCheck::Presence,
                ),
                FieldRule::new(
                    "last_name_required",
                    "last_name",
                    Warning,
                    FieldCheck::Presence,
                ),
                FieldRule::new(
                    "date_of_birth_required",
                    "date_of_birth",
                    Critical,
                    FieldCheck::Presence,
                ),
                FieldRule::new(
                    "date_of_birth_valid",
                    "date_of_birth",
                    Critical,
                    FieldCheck::Date { forbid_future: true },
                ),
                FieldRule::new(
                    "eligibility_start_format",
                    "eligibility_start",
                    Warning,
                    FieldCheck::Date {
                        forbid_future: false,
                    },
                ),
                FieldRule::new(
                    "eligibility_end_format",
                    "eligibility_end",
                    Warning,
                    FieldCheck::Date {
                        forbid_future: false,
                    },
                ),
            ],
            cross_rules: vec![CrossFieldRule::new(
                "eligibility_window",
                &["eligibility_start", "eligibility_end"],
                Critical,
                CrossCheck::EligibilityWindow,
            )],
        };

        let provider = KindRules {
            field_rules: vec![
                FieldRule::new(
                    "provider_npi_required",
                    "provider_npi",
                    Critical,
                    FieldCheck::Presence,
                ),
                FieldRule::new("npi_checksum", "provider_npi", Critical, FieldCheck::Npi),
                FieldRule::new(
                    "provider_name_required",
                    "provider_name",
                    Warning,
                    FieldCheck::Presence,
                ),
                FieldRule::new(
                    "taxonomy_code_format",
                    "taxonomy_code",
                    Warning,
                    FieldCheck::Taxonomy,
                ),
                FieldRule::new(
                    "license_number_required",
                    "license_number",
                    Warning,
                    FieldCheck::Presence,
                ),
                FieldRule::new(
                    "license_expiration_format",
                    "license_expiration_date",
                    Warning,
                    FieldCheck::Date {
                        forbid_future: false,
                    },
                ),
            ],
            cross_rules: vec![CrossFieldRule::new(
                "active_license_current",
                &["status", "license_expiration_date"],
                Critical,
                CrossCheck::ActiveLicense,
            )],
        };

        Self {
            claim,
            member,
            provider,
        }
    }

    /// Returns the rules for a record kind.
    pub fn rules_for(&self, kind: SchemaKind) -> &KindRules {
        match kind {
            SchemaKind::Claim => &self.claim,
            SchemaKind::Member => &self.member,
            SchemaKind::Provider => &self.provider,
        }
    }

    /// Returns true if any kind declares a rule with this identifier.
    pub fn contains_rule(&self, id: &str) -> bool {
        SchemaKind::ALL.iter().any(|kind| {
            let rules = self.rules_for(*kind);
            rules.field_rules.iter().any(|r| r.id == id)
                || rules.cross_rules.iter().any(|r| r.id == id)
        })
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::healthcare()
    }
}
