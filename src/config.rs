//! Analysis settings loaded from YAML.
//!
//! Every field has a default, so an empty file (or no file at all) gives the
//! built-in behaviour.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::analysis::aggregate::Direction;
use crate::analysis::engine::ParseOptions;
use crate::analysis::group_key::GroupBy;
use crate::analysis::schema::{ReportSchema, UnknownFieldPolicy};
use crate::analysis::types::SectionName;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Sections whose absence makes a file fail to parse.
    pub required_sections: Vec<SectionName>,
    /// Policy for keys without a registered alias.
    pub unknown_fields: UnknownFieldPolicy,
    /// Per-section overrides of `unknown_fields`.
    pub section_unknown_fields: BTreeMap<SectionName, UnknownFieldPolicy>,
    /// Extra spellings per section and canonical field.
    pub extra_aliases: BTreeMap<SectionName, BTreeMap<String, Vec<String>>>,
    pub group_by: GroupBy,
    pub best_metric: String,
    pub best_direction: Direction,
    /// File name suffix used when searching directories for reports.
    pub file_suffix: String,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            required_sections: vec![SectionName::OverallStats, SectionName::PerNodeStats],
            unknown_fields: UnknownFieldPolicy::PassThrough,
            section_unknown_fields: BTreeMap::new(),
            extra_aliases: BTreeMap::new(),
            group_by: GroupBy::SpreadingFactor,
            best_metric: "PDR_percent".to_string(),
            best_direction: Direction::Highest,
            file_suffix: "_results.csv".to_string(),
        }
    }
}

impl AnalysisConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.best_metric.trim().is_empty() {
            return Err(ConfigError::InvalidMetric(
                "best_metric cannot be empty".to_string(),
            ));
        }
        if self.file_suffix.is_empty() {
            return Err(ConfigError::InvalidDiscovery(
                "file_suffix cannot be empty".to_string(),
            ));
        }
        if let GroupBy::Field(name) = &self.group_by {
            if name.trim().is_empty() {
                return Err(ConfigError::InvalidGroupBy(
                    "field grouping needs a field name".to_string(),
                ));
            }
        }

        for (section, canonicals) in &self.extra_aliases {
            for (canonical, aliases) in canonicals {
                if canonical.trim().is_empty() {
                    return Err(ConfigError::InvalidAlias(format!(
                        "{}: canonical field name cannot be empty",
                        section
                    )));
                }
                if let Some(bad) = aliases.iter().find(|a| a.trim().is_empty() || a.contains(',')) {
                    return Err(ConfigError::InvalidAlias(format!(
                        "{}.{}: invalid alias '{}'",
                        section, canonical, bad
                    )));
                }
            }
        }

        let mut seen = Vec::new();
        for section in &self.required_sections {
            if seen.contains(section) {
                return Err(ConfigError::InvalidSection(format!(
                    "{} listed twice in required_sections",
                    section
                )));
            }
            seen.push(*section);
        }

        Ok(())
    }

    /// Built-in schema adjusted by this configuration.
    pub fn schema(&self) -> ReportSchema {
        let mut schema = ReportSchema::builtin().with_required(self.required_sections.clone());
        for section in SectionName::ALL {
            let policy = self
                .section_unknown_fields
                .get(&section)
                .copied()
                .unwrap_or(self.unknown_fields);
            schema = schema.with_unknown_policy(section, policy);
        }
        for (section, canonicals) in &self.extra_aliases {
            for (canonical, aliases) in canonicals {
                schema.add_aliases(*section, canonical, aliases);
            }
        }
        schema
    }

    /// Cache salt covering every setting that changes parse results.
    pub fn cache_salt(&self, options: &ParseOptions) -> String {
        format!(
            "{:?}|{:?}|{:?}|{:?}|{:?}|{}",
            self.required_sections,
            self.unknown_fields,
            self.section_unknown_fields,
            self.extra_aliases,
            options.unknown_fields,
            env!("CARGO_PKG_VERSION"),
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid section configuration: {0}")]
    InvalidSection(String),
    #[error("Invalid alias configuration: {0}")]
    InvalidAlias(String),
    #[error("Invalid grouping: {0}")]
    InvalidGroupBy(String),
    #[error("Invalid metric: {0}")]
    InvalidMetric(String),
    #[error("Invalid discovery configuration: {0}")]
    InvalidDiscovery(String),
}
