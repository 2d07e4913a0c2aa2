//! depurar - Healthcare Record Validation and Quality Scoring
//!
//! A rule-driven validation engine for healthcare transactional data
//! (claims, member enrollment, provider records). Batches of records are
//! checked against built-in Medicaid/Medicare rule tables; the result is
//! a quality report with a 0-100 score, per-severity counts, and an
//! ordered list of findings.
//!
//! # Design Principles
//!
//! 1. **Deterministic** - The evaluation date is an explicit input; the
//!    same batch, rules, and date always produce byte-identical reports,
//!    regardless of worker count
//! 2. **Pure Rust** - No FFI, no service dependencies
//! 3. **One problem, one finding** - Format rules skip absent fields;
//!    presence rules report them
//! 4. **Cancellable** - Long runs stop at a record boundary and return a
//!    partial report marked as cancelled
//!
//! # Quick Start
//!
//! ```
//! use depurar::{QualityEngine, Record, SchemaKind};
//!
//! let batch = vec![Record::new()
//!     .with("claim_id", "CLM001")
//!     .with("member_id", "M123456789")
//!     .with("provider_npi", "1234567893")
//!     .with("diagnosis_code", "Z00.00")
//!     .with("procedure_code", "99213")
//!     .with("date_of_service", "2023-06-15")
//!     .with("claim_amount", 125.50)];
//!
//! let as_of = chrono::NaiveDate::from_ymd_opt(2023, 7, 1).unwrap();
//! let report = QualityEngine::new()
//!     .score(&batch, SchemaKind::Claim, as_of)
//!     .unwrap();
//!
//! assert_eq!(report.score, 100.0);
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
// Allow common test patterns
#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::cast_precision_loss,
        clippy::float_cmp,
        clippy::too_many_lines,
        clippy::similar_names,
        clippy::unreadable_literal
    )
)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::module_name_repetitions)]

pub mod engine;
pub mod error;
pub mod record;
pub mod report;
pub mod rules;
pub mod validator;

pub use engine::{CancelToken, QualityEngine, SeverityWeights};
pub use error::{Error, Result};
pub use record::{FieldValue, Record, SchemaKind};
pub use report::{Finding, QualityReport, SeverityCounts};
pub use rules::{
    CheckResult, CrossFieldRule, FieldCheck, FieldRule, KindRules, RuleCode, RuleSet, Severity,
    Violation,
};
pub use validator::{RecordOutcome, RecordValidator};
