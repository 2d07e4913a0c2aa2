//! Records and schema kinds.
//!
//! A [`Record`] is an immutable mapping from field name to [`FieldValue`],
//! the shape in which external callers hand batches to the engine. The
//! [`SchemaKind`] selects which rule table applies.

use std::{collections::HashMap, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// A single field value within a record.
///
/// Dates travel as text and are parsed by the date validators; numbers
/// may arrive either as [`FieldValue::Number`] or as numeric text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Explicit null / missing value.
    Null,
    /// Numeric value (claim amounts, counts).
    Number(f64),
    /// Text value (identifiers, codes, dates).
    Text(String),
}

impl FieldValue {
    /// Returns the value as a string slice, if textual.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Returns the value as a number, parsing numeric text if needed.
    ///
    /// Currency symbols, commas, and surrounding whitespace are stripped
    /// before parsing, matching how claim amounts arrive in feeds.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(s) => {
                let cleaned: String = s
                    .trim()
                    .chars()
                    .filter(|c| !matches!(c, '$' | ',' | ' '))
                    .collect();
                cleaned.parse().ok()
            }
            Self::Null => None,
        }
    }

    /// Returns true if the value is null or blank text.
    ///
    /// Blank text counts as absent for presence checks: upstream feeds
    /// routinely emit `""` where a column has no data.
    pub fn is_absent(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Text(s) => s.trim().is_empty(),
            Self::Number(_) => false,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<f64> for FieldValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

/// A single transactional record: field name to value.
///
/// Records are read-only inputs to validation; the engine never mutates
/// them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    fields: HashMap<String, FieldValue>,
}

impl Record {
    /// Creates an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a field, returning the record for chaining.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Returns the value of a field, if present.
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Returns the trimmed text of a field, if present and textual.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(FieldValue::as_text).map(str::trim)
    }

    /// Returns true if the field is missing, null, or blank text.
    pub fn is_absent(&self, name: &str) -> bool {
        self.get(name).map_or(true, FieldValue::is_absent)
    }

    /// Returns the number of fields in the record.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if the record has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl FromIterator<(String, FieldValue)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, FieldValue)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

/// The kind of record a batch contains, selecting the applicable rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaKind {
    /// Healthcare claim records.
    Claim,
    /// Member / patient enrollment records.
    Member,
    /// Provider records.
    Provider,
}

impl SchemaKind {
    /// All known schema kinds.
    pub const ALL: [Self; 3] = [Self::Claim, Self::Member, Self::Provider];

    /// Stable identifier for the kind.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Claim => "claim",
            Self::Member => "member",
            Self::Provider => "provider",
        }
    }
}

impl fmt::Display for SchemaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SchemaKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "claim" => Ok(Self::Claim),
            "member" => Ok(Self::Member),
            "provider" => Ok(Self::Provider),
            _ => Err(Error::unknown_schema(s)),
        }
    }
}
