//! Parse failures and data-quality findings.
//!
//! Only [`ParseError`] ever escapes the parser. Everything else is absorbed
//! into a [`Diagnostic`] carried by the report.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::scalar::TypeTag;
use super::types::SectionName;

/// Fatal failure for a single report file.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    #[error("{source_id}: required section {section} is missing")]
    MissingRequiredSection {
        source_id: String,
        section: SectionName,
    },
}

impl ParseError {
    pub fn source_id(&self) -> &str {
        match self {
            ParseError::MissingRequiredSection { source_id, .. } => source_id,
        }
    }
}

/// Non-fatal finding recorded while parsing or assembling a report.
///
/// Line numbers are 1-based positions in the source text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Diagnostic {
    /// Data row whose field count differs from the header; the row was skipped.
    MalformedRow {
        section: SectionName,
        line: usize,
        expected: usize,
        found: usize,
    },
    /// Value could not be read as its declared type and became `Null`.
    CoercionFailure {
        section: SectionName,
        line: usize,
        field: String,
        raw: String,
        expected: TypeTag,
    },
    /// Key or column without a registered alias.
    UnknownField {
        section: SectionName,
        key: String,
        kept: bool,
    },
    /// Column resolving to a canonical field already provided by a
    /// higher-priority alias; its values were ignored.
    ShadowedColumn {
        section: SectionName,
        column: String,
        canonical: String,
    },
    /// Table section with no header row.
    MissingHeader { section: SectionName },
    /// Per-row accounting disagrees with the file-level total.
    CrossCheckMismatch {
        check: String,
        reported: f64,
        computed: f64,
    },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::MalformedRow {
                section,
                line,
                expected,
                found,
            } => write!(
                f,
                "{} line {}: expected {} fields, found {}; row skipped",
                section, line, expected, found
            ),
            Diagnostic::CoercionFailure {
                section,
                line,
                field,
                raw,
                expected,
            } => write!(
                f,
                "{} line {}: '{}' is not a valid {} for {}",
                section, line, raw, expected, field
            ),
            Diagnostic::UnknownField { section, key, kept } => write!(
                f,
                "{}: unknown field '{}' ({})",
                section,
                key,
                if *kept { "kept untyped" } else { "dropped" }
            ),
            Diagnostic::ShadowedColumn {
                section,
                column,
                canonical,
            } => write!(
                f,
                "{}: column '{}' ignored, {} already provided",
                section, column, canonical
            ),
            Diagnostic::MissingHeader { section } => {
                write!(f, "{}: no header row", section)
            }
            Diagnostic::CrossCheckMismatch {
                check,
                reported,
                computed,
            } => write!(
                f,
                "cross-check {}: reported {} but rows sum to {}",
                check, reported, computed
            ),
        }
    }
}
