//! Core data types for parsed simulation reports.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::diagnostics::Diagnostic;
use super::scalar::Scalar;

/// Canonical field name -> value mapping of a key/value section.
pub type Fields = BTreeMap<String, Scalar>;

/// Named block of a report file, identified by an exact title line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SectionName {
    #[serde(rename = "CONFIGURATION")]
    Configuration,
    #[serde(rename = "OVERALL_STATS")]
    OverallStats,
    #[serde(rename = "PER_NODE_STATS")]
    PerNodeStats,
    #[serde(rename = "PER_GATEWAY_STATS")]
    PerGatewayStats,
    #[serde(rename = "INTERFERENCE_STATS")]
    InterferenceStats,
    #[serde(rename = "CAPTURE_EFFECT_ANALYSIS")]
    CaptureEffectAnalysis,
}

/// How the lines of a section are laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionKind {
    /// `key,value` lines
    KeyValue,
    /// header row followed by CSV data rows
    Table,
}

impl SectionName {
    pub const ALL: [SectionName; 6] = [
        SectionName::Configuration,
        SectionName::OverallStats,
        SectionName::PerNodeStats,
        SectionName::PerGatewayStats,
        SectionName::InterferenceStats,
        SectionName::CaptureEffectAnalysis,
    ];

    pub fn title(self) -> &'static str {
        match self {
            SectionName::Configuration => "CONFIGURATION",
            SectionName::OverallStats => "OVERALL_STATS",
            SectionName::PerNodeStats => "PER_NODE_STATS",
            SectionName::PerGatewayStats => "PER_GATEWAY_STATS",
            SectionName::InterferenceStats => "INTERFERENCE_STATS",
            SectionName::CaptureEffectAnalysis => "CAPTURE_EFFECT_ANALYSIS",
        }
    }

    pub fn from_title(title: &str) -> Option<SectionName> {
        SectionName::ALL.into_iter().find(|s| s.title() == title)
    }

    pub fn kind(self) -> SectionKind {
        match self {
            SectionName::PerNodeStats | SectionName::PerGatewayStats => SectionKind::Table,
            _ => SectionKind::KeyValue,
        }
    }
}

impl fmt::Display for SectionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

impl FromStr for SectionName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SectionName::from_title(s.trim()).ok_or_else(|| format!("unknown section '{}'", s))
    }
}

/// Read access to named scalars, shared by records and key/value sections.
pub trait FieldSource {
    fn scalar(&self, name: &str) -> Option<&Scalar>;

    fn number(&self, name: &str) -> Option<f64> {
        self.scalar(name).and_then(Scalar::as_f64)
    }

    fn integer(&self, name: &str) -> Option<i64> {
        self.scalar(name).and_then(Scalar::as_i64)
    }

    fn flag(&self, name: &str) -> Option<bool> {
        self.scalar(name).and_then(Scalar::as_bool)
    }
}

impl FieldSource for Fields {
    fn scalar(&self, name: &str) -> Option<&Scalar> {
        self.get(name).filter(|v| !v.is_null())
    }
}

/// One row of a table section, keyed by canonical column name in header order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Record {
    fields: Vec<(String, Scalar)>,
}

impl Record {
    pub(crate) fn with_capacity(n: usize) -> Self {
        Self { fields: Vec::with_capacity(n) }
    }

    pub(crate) fn push(&mut self, name: String, value: Scalar) {
        self.fields.push((name, value));
    }

    /// Value of a column, including explicit `Null`s.
    pub fn get(&self, name: &str) -> Option<&Scalar> {
        self.fields.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.iter().any(|(k, _)| k == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Scalar)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl FieldSource for Record {
    fn scalar(&self, name: &str) -> Option<&Scalar> {
        self.get(name).filter(|v| !v.is_null())
    }
}

/// One parsed report file.
///
/// Built once by the assembler and never modified afterwards; all access
/// goes through the read-only accessors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    source_id: String,
    metadata: BTreeMap<String, String>,
    config: Fields,
    overall: Fields,
    sections: BTreeMap<SectionName, Fields>,
    tables: BTreeMap<SectionName, Vec<Record>>,
    derived: Fields,
    diagnostics: Vec<Diagnostic>,
}

impl Report {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        source_id: String,
        metadata: BTreeMap<String, String>,
        config: Fields,
        overall: Fields,
        sections: BTreeMap<SectionName, Fields>,
        tables: BTreeMap<SectionName, Vec<Record>>,
        derived: Fields,
        diagnostics: Vec<Diagnostic>,
    ) -> Self {
        Self {
            source_id,
            metadata,
            config,
            overall,
            sections,
            tables,
            derived,
            diagnostics,
        }
    }

    /// Path or other identifier the report was read from.
    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    /// Values taken from `#` header comments (title, scenario number, ...).
    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }

    pub fn config(&self) -> &Fields {
        &self.config
    }

    /// OVERALL_STATS, completed with the overall fallback metrics.
    pub fn overall(&self) -> &Fields {
        &self.overall
    }

    /// Additional key/value sections (INTERFERENCE_STATS, CAPTURE_EFFECT_ANALYSIS).
    pub fn section(&self, name: SectionName) -> Option<&Fields> {
        self.sections.get(&name)
    }

    pub fn sections(&self) -> &BTreeMap<SectionName, Fields> {
        &self.sections
    }

    pub fn table(&self, name: SectionName) -> Option<&[Record]> {
        self.tables.get(&name).map(Vec::as_slice)
    }

    pub fn tables(&self) -> &BTreeMap<SectionName, Vec<Record>> {
        &self.tables
    }

    pub fn nodes(&self) -> &[Record] {
        self.table(SectionName::PerNodeStats).unwrap_or(&[])
    }

    pub fn gateways(&self) -> &[Record] {
        self.table(SectionName::PerGatewayStats).unwrap_or(&[])
    }

    /// Report-level metrics computed by the assembler.
    pub fn derived(&self) -> &Fields {
        &self.derived
    }

    /// Non-fatal data-quality findings collected while parsing.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Look a value up in overall, then derived, then config.
    pub fn lookup(&self, name: &str) -> Option<&Scalar> {
        self.overall
            .scalar(name)
            .or_else(|| self.derived.scalar(name))
            .or_else(|| self.config.scalar(name))
    }

    /// Every numeric overall/derived value, overall taking precedence.
    pub fn numeric_fields(&self) -> BTreeMap<&str, f64> {
        let mut out = BTreeMap::new();
        for (name, value) in self.derived.iter().chain(self.overall.iter()) {
            if let Some(v) = value.as_f64() {
                out.insert(name.as_str(), v);
            }
        }
        out
    }
}
