//! Single-field validators.
//!
//! Pure functions over one field value: no shared state, no clock reads.
//! Each returns `Ok(())` or a [`Violation`] carrying the finding code and
//! a human-readable reason. Date-sensitive checks take the evaluation
//! date as an argument so runs are reproducible.

use chrono::NaiveDate;
use regex::Regex;

use super::RuleCode;

/// A failed field check: the taxonomy code plus the reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Finding taxonomy code.
    pub code: RuleCode,
    /// Human-readable reason.
    pub message: String,
}

impl Violation {
    fn new(code: RuleCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Date formats accepted across healthcare feeds, tried in order.
pub const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%m/%d/%Y", "%Y%m%d"];

/// Parses a date in any accepted format.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let trimmed = value.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
}

/// Validates a National Provider Identifier.
///
/// An NPI is exactly 10 digits whose Luhn checksum, computed as if the
/// constant prefix `80840` were prepended, is zero. The prefix
/// contributes a fixed 24 to the digit sum.
pub fn npi(value: &str) -> Result<(), Violation> {
    let v = value.trim();
    if v.len() != 10 || !v.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Violation::new(
            RuleCode::FormatError,
            format!("NPI must be exactly 10 digits, got '{v}'"),
        ));
    }

    let mut sum = 24u32; // contribution of the conceptual 80840 prefix
    for (i, b) in v.bytes().rev().enumerate() {
        let mut d = u32::from(b - b'0');
        if i % 2 == 1 {
            d *= 2;
            if d > 9 {
                d -= 9;
            }
        }
        sum += d;
    }

    if sum % 10 != 0 {
        return Err(Violation::new(
            RuleCode::ChecksumMismatch,
            format!("NPI '{v}' fails Luhn checksum"),
        ));
    }
    Ok(())
}

/// Validates an ICD-10 diagnosis code.
///
/// Structure: letter, digit, alphanumeric, then an optional decimal part
/// of 1-4 alphanumerics (`Z00.00`, `I10`, `J45.909`). Codes in the
/// reserved `U` range are structurally valid but flagged.
pub fn icd10(pattern: &Regex, value: &str) -> Result<(), Violation> {
    let v = value.trim().to_ascii_uppercase();
    if !pattern.is_match(&v) {
        return Err(Violation::new(
            RuleCode::FormatError,
            format!("'{}' is not a valid ICD-10 code", value.trim()),
        ));
    }
    if v.starts_with('U') {
        return Err(Violation::new(
            RuleCode::ReservedCode,
            format!("ICD-10 code '{v}' is in the reserved U range"),
        ));
    }
    Ok(())
}

/// Validates a CPT procedure code: exactly 5 digits, at or above the
/// lowest assigned code (00100).
pub fn cpt(value: &str) -> Result<(), Violation> {
    let v = value.trim();
    if v.len() != 5 || !v.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Violation::new(
            RuleCode::FormatError,
            format!("CPT code must be exactly 5 digits, got '{v}'"),
        ));
    }
    // All-zero and the reserved sub-00100 block are never valid codes.
    if v.parse::<u32>().unwrap_or(0) < 100 {
        return Err(Violation::new(
            RuleCode::FormatError,
            format!("CPT code '{v}' is below the assigned range (00100-99999)"),
        ));
    }
    Ok(())
}

/// Validates an HCPCS Level II code: letter A-V (excluding I and O)
/// followed by 4 digits.
pub fn hcpcs(pattern: &Regex, value: &str) -> Result<(), Violation> {
    let v = value.trim().to_ascii_uppercase();
    if pattern.is_match(&v) {
        Ok(())
    } else {
        Err(Violation::new(
            RuleCode::FormatError,
            format!("'{}' is not a valid HCPCS Level II code", value.trim()),
        ))
    }
}

/// Validates that a value parses as a calendar date in an accepted
/// format; optionally forbids dates after `as_of`.
pub fn date(value: &str, as_of: NaiveDate, forbid_future: bool) -> Result<(), Violation> {
    let Some(parsed) = parse_date(value) else {
        return Err(Violation::new(
            RuleCode::FormatError,
            format!("'{}' is not a valid date", value.trim()),
        ));
    };
    if forbid_future && parsed > as_of {
        return Err(Violation::new(
            RuleCode::FutureDate,
            format!("date {parsed} is in the future"),
        ));
    }
    Ok(())
}

/// Validates a member ID against state-specific and generic patterns.
///
/// The value is trimmed and uppercased before matching; any single
/// pattern match is sufficient.
pub fn member_id(patterns: &[Regex], value: &str) -> Result<(), Violation> {
    let v = value.trim().to_ascii_uppercase();
    if patterns.iter().any(|p| p.is_match(&v)) {
        Ok(())
    } else {
        Err(Violation::new(
            RuleCode::FormatError,
            format!("member ID '{}' matches no known state or generic format", value.trim()),
        ))
    }
}

/// Validates a claim amount: numeric, strictly positive, at or below the
/// plausibility cap.
pub fn amount(value: Option<f64>, raw: &str, max: f64) -> Result<(), Violation> {
    let Some(n) = value else {
        return Err(Violation::new(
            RuleCode::FormatError,
            format!("'{}' is not a numeric amount", raw.trim()),
        ));
    };
    if !n.is_finite() || n <= 0.0 {
        return Err(Violation::new(
            RuleCode::OutOfRange,
            format!("claim amount must be greater than zero, got {n}"),
        ));
    }
    if n > max {
        return Err(Violation::new(
            RuleCode::OutOfRange,
            format!("claim amount {n:.2} exceeds the {max:.0} cap"),
        ));
    }
    Ok(())
}

/// Validates a place-of-service code: two digits in 01-99.
pub fn place_of_service(value: &str) -> Result<(), Violation> {
    let v = value.trim();
    let ok = v.len() == 2
        && v.bytes().all(|b| b.is_ascii_digit())
        && v.parse::<u8>().map_or(false, |n| (1..=99).contains(&n));
    if ok {
        Ok(())
    } else {
        Err(Violation::new(
            RuleCode::FormatError,
            format!("place of service must be a 2-digit code 01-99, got '{v}'"),
        ))
    }
}

/// Validates a provider taxonomy code: exactly 10 alphanumerics.
pub fn taxonomy(value: &str) -> Result<(), Violation> {
    let v = value.trim();
    if v.len() == 10 && v.bytes().all(|b| b.is_ascii_alphanumeric()) {
        Ok(())
    } else {
        Err(Violation::new(
            RuleCode::FormatError,
            format!("taxonomy code must be 10 alphanumeric characters, got '{v}'"),
        ))
    }
}
