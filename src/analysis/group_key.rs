//! Built-in strategies for choosing the group a report belongs to.

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::aggregate::GroupKey;
use super::scalar::{narrow_to_int, Scalar};
use super::types::{FieldSource, Report};

struct Patterns {
    sf: Regex,
    interval: Regex,
    gateways: [Regex; 3],
}

static PATTERNS: LazyLock<Patterns> = LazyLock::new(|| Patterns {
    sf: Regex::new(r"(?i)sf[_-]?(\d+)").expect("Invalid sf regex"),
    interval: Regex::new(r"(?i)interval[-_]?(\d+)s").expect("Invalid interval regex"),
    gateways: [
        Regex::new(r"(?i)(\d+)gw").expect("Invalid gateway_suffix regex"),
        Regex::new(r"(?i)gateway[_-]?(\d+)").expect("Invalid gateway_name regex"),
        Regex::new(r"(?i)gw[_-]?(\d+)").expect("Invalid gateway_prefix regex"),
    ],
});

/// How reports are grouped before aggregation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum GroupBy {
    /// `SpreadingFactor`, else `sfN` in the file stem.
    #[default]
    SpreadingFactor,
    /// `PacketInterval_s`, else `intervalNs` in the identifier.
    PacketInterval,
    /// `NumberOfGateways`, else `Ngw` / `gatewayN` / `gwN` in the path.
    GatewayCount,
    /// Parent directory of the report file.
    Configuration,
    /// Any overall, derived or config scalar.
    Field(String),
}

impl fmt::Display for GroupBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupBy::SpreadingFactor => f.write_str("sf"),
            GroupBy::PacketInterval => f.write_str("interval"),
            GroupBy::GatewayCount => f.write_str("gateways"),
            GroupBy::Configuration => f.write_str("configuration"),
            GroupBy::Field(name) => write!(f, "field:{}", name),
        }
    }
}

impl FromStr for GroupBy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(name) = s.strip_prefix("field:") {
            if name.is_empty() {
                return Err("field: needs a field name".to_string());
            }
            return Ok(GroupBy::Field(name.to_string()));
        }
        match s.to_ascii_lowercase().as_str() {
            "sf" | "spreading_factor" => Ok(GroupBy::SpreadingFactor),
            "interval" | "packet_interval" => Ok(GroupBy::PacketInterval),
            "gateways" | "gw" | "gateway_count" => Ok(GroupBy::GatewayCount),
            "configuration" | "config" => Ok(GroupBy::Configuration),
            other => Err(format!(
                "unknown grouping '{}' (expected sf, interval, gateways, configuration or field:NAME)",
                other
            )),
        }
    }
}

impl TryFrom<String> for GroupBy {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<GroupBy> for String {
    fn from(value: GroupBy) -> Self {
        value.to_string()
    }
}

/// Group key for a single scalar; `Null` and empty strings are `Unknown`.
pub fn scalar_to_key(value: Option<&Scalar>) -> GroupKey {
    match value {
        Some(Scalar::Int(i)) => GroupKey::Int(*i),
        Some(Scalar::Float(f)) => match narrow_to_int(*f) {
            Some(i) => GroupKey::Int(i),
            None => GroupKey::Text(f.to_string()),
        },
        Some(Scalar::Bool(b)) => GroupKey::Text(b.to_string()),
        Some(Scalar::String(s)) if !s.trim().is_empty() => GroupKey::Text(s.trim().to_string()),
        _ => GroupKey::Unknown,
    }
}

fn capture_int(re: &Regex, text: &str) -> Option<i64> {
    re.captures(text)?.get(1)?.as_str().parse().ok()
}

fn file_stem(source_id: &str) -> &str {
    Path::new(source_id)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(source_id)
}

fn parent_name(source_id: &str) -> Option<&str> {
    Path::new(source_id)
        .parent()
        .and_then(|p| p.file_name())
        .and_then(|s| s.to_str())
}

fn report_int(report: &Report, name: &str) -> Option<i64> {
    report
        .overall()
        .integer(name)
        .or_else(|| report.config().integer(name))
}

impl GroupBy {
    pub fn key(&self, report: &Report) -> GroupKey {
        let id = report.source_id();
        let found = match self {
            GroupBy::SpreadingFactor => report_int(report, "SpreadingFactor")
                .or_else(|| capture_int(&PATTERNS.sf, file_stem(id))),
            GroupBy::PacketInterval => report_int(report, "PacketInterval_s")
                .or_else(|| capture_int(&PATTERNS.interval, id)),
            GroupBy::GatewayCount => report.overall().integer("NumberOfGateways").or_else(|| {
                let name = Path::new(id)
                    .file_name()
                    .and_then(|s| s.to_str())
                    .unwrap_or(id);
                [Some(name), parent_name(id)]
                    .into_iter()
                    .flatten()
                    .find_map(|text| {
                        PATTERNS
                            .gateways
                            .iter()
                            .find_map(|re| capture_int(re, text))
                    })
            }),
            GroupBy::Configuration => {
                let name = parent_name(id)
                    .filter(|p| !p.is_empty())
                    .unwrap_or_else(|| file_stem(id));
                return scalar_to_key(Some(&Scalar::String(name.to_string())));
            }
            GroupBy::Field(name) => return scalar_to_key(report.lookup(name)),
        };
        found.map(GroupKey::Int).unwrap_or(GroupKey::Unknown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::assembler::{assemble, SectionSet};
    use crate::analysis::types::Fields;

    fn report(id: &str, overall: &[(&str, Scalar)]) -> Report {
        let overall: Fields = overall.iter().map(|(k, v)| (k.to_string(), v.clone())).collect();
        assemble(
            id,
            SectionSet {
                overall,
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_parse_group_by() {
        assert_eq!("sf".parse::<GroupBy>(), Ok(GroupBy::SpreadingFactor));
        assert_eq!("Gateways".parse::<GroupBy>(), Ok(GroupBy::GatewayCount));
        assert_eq!(
            "field:AvgSF".parse::<GroupBy>(),
            Ok(GroupBy::Field("AvgSF".into()))
        );
        assert!("field:".parse::<GroupBy>().is_err());
        assert!("colour".parse::<GroupBy>().is_err());
        assert_eq!(GroupBy::Field("x".into()).to_string(), "field:x");
    }

    #[test]
    fn test_sf_prefers_report_value() {
        let r = report("runs/sf9_results.csv", &[("SpreadingFactor", Scalar::Int(7))]);
        assert_eq!(GroupBy::SpreadingFactor.key(&r), GroupKey::Int(7));

        let r = report("runs/SF-10_results.csv", &[]);
        assert_eq!(GroupBy::SpreadingFactor.key(&r), GroupKey::Int(10));
    }

    #[test]
    fn test_interval_and_gateways_from_identifier() {
        let r = report("out/interval_600s_results.csv", &[]);
        assert_eq!(GroupBy::PacketInterval.key(&r), GroupKey::Int(600));

        let r = report("out/4gw/scenario_08_results.csv", &[]);
        assert_eq!(GroupBy::GatewayCount.key(&r), GroupKey::Int(4));

        let r = report("out/gateway_2_results.csv", &[]);
        assert_eq!(GroupBy::GatewayCount.key(&r), GroupKey::Int(2));
    }

    #[test]
    fn test_undeterminable_key_is_unknown() {
        let r = report("plain_results.csv", &[]);
        assert_eq!(GroupBy::SpreadingFactor.key(&r), GroupKey::Unknown);
        assert_eq!(GroupBy::PacketInterval.key(&r), GroupKey::Unknown);
        assert_eq!(GroupBy::Field("Missing".into()).key(&r), GroupKey::Unknown);
    }

    #[test]
    fn test_configuration_uses_parent_directory() {
        let r = report("results/adr_on/run_results.csv", &[]);
        assert_eq!(GroupBy::Configuration.key(&r), GroupKey::Text("adr_on".into()));
        let r = report("run_results.csv", &[]);
        assert_eq!(GroupBy::Configuration.key(&r), GroupKey::Text("run_results".into()));
    }

    #[test]
    fn test_scalar_to_key() {
        assert_eq!(scalar_to_key(Some(&Scalar::Float(7.0))), GroupKey::Int(7));
        assert_eq!(scalar_to_key(Some(&Scalar::Float(7.5))), GroupKey::Text("7.5".into()));
        assert_eq!(scalar_to_key(Some(&Scalar::Null)), GroupKey::Unknown);
        assert_eq!(scalar_to_key(None), GroupKey::Unknown);
    }
}
