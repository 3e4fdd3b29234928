//! Combines the parsed sections of one file into an immutable [`Report`].
//!
//! Overall metrics missing from OVERALL_STATS are filled from an ordered
//! rule table; a value the file reports explicitly is never replaced.
//! Report-level metrics (coverage, load balance, node averages, ...) land
//! in [`Report::derived`].

use std::collections::BTreeMap;

use super::diagnostics::Diagnostic;
use super::scalar::Scalar;
use super::stats::{calculate_stats, mean, percent, sample_std};
use super::types::{FieldSource, Fields, Record, Report, SectionName};

/// Everything the section parsers produced for one file.
#[derive(Debug, Clone, Default)]
pub struct SectionSet {
    pub metadata: BTreeMap<String, String>,
    pub config: Fields,
    pub overall: Fields,
    /// Key/value sections other than CONFIGURATION and OVERALL_STATS.
    pub sections: BTreeMap<SectionName, Fields>,
    pub tables: BTreeMap<SectionName, Vec<Record>>,
    pub diagnostics: Vec<Diagnostic>,
}

impl SectionSet {
    fn nodes(&self) -> &[Record] {
        self.tables
            .get(&SectionName::PerNodeStats)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn gateways(&self) -> &[Record] {
        self.tables
            .get(&SectionName::PerGatewayStats)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn interference(&self, name: &str) -> Option<&Scalar> {
        self.sections
            .get(&SectionName::InterferenceStats)
            .and_then(|s| s.scalar(name))
    }
}

/// Inputs visible to an overall fallback rule. `overall` already holds the
/// results of earlier rules.
struct RuleInput<'a> {
    parts: &'a SectionSet,
    overall: &'a Fields,
}

type OverallRule = (&'static str, fn(&RuleInput) -> Scalar);

/// Fallbacks for OVERALL_STATS, applied in order. A field may have several
/// rules; the first non-null result wins.
const OVERALL_RULES: &[OverallRule] = &[
    ("NumberOfNodes", |i| {
        i.parts
            .config
            .scalar("NumberOfNodes")
            .cloned()
            .or_else(|| {
                i.parts
                    .tables
                    .get(&SectionName::PerNodeStats)
                    .map(|t| Scalar::Int(t.len() as i64))
            })
            .unwrap_or(Scalar::Null)
    }),
    ("NumberOfGateways", |i| {
        i.parts
            .config
            .scalar("NumberOfGateways")
            .cloned()
            .or_else(|| {
                i.parts
                    .tables
                    .get(&SectionName::PerGatewayStats)
                    .map(|t| Scalar::Int(t.len() as i64))
            })
            .unwrap_or(Scalar::Null)
    }),
    ("SpreadingFactor", |i| config_value(i, "SpreadingFactor")),
    ("PacketInterval_s", |i| config_value(i, "PacketInterval_s")),
    ("ADR_Enabled", |i| config_value(i, "EnableADR")),
    ("TotalCollisions", |i| {
        i.parts
            .interference("Lost_Interference_Total")
            .cloned()
            .unwrap_or(Scalar::Null)
    }),
    ("TotalCollisions", |i| {
        i.overall.scalar("TotalInterference").cloned().unwrap_or(Scalar::Null)
    }),
    ("TotalUnderSensitivity", |i| {
        i.parts
            .interference("Lost_UnderSensitivity_Total")
            .cloned()
            .unwrap_or(Scalar::Null)
    }),
    ("Dropped", |i| {
        match (i.overall.integer("TotalSent"), i.overall.integer("TotalReceived")) {
            (Some(sent), Some(received)) => sent.checked_sub(received).map_or(Scalar::Null, Scalar::Int),
            _ => Scalar::Null,
        }
    }),
    ("PDR_percent", |i| sent_rate(i, "TotalReceived")),
    ("DropRate_percent", |i| sent_rate(i, "Dropped")),
    ("CollisionRate_percent", |i| sent_rate(i, "TotalCollisions")),
    ("UnderSensitivityRate_percent", |i| sent_rate(i, "TotalUnderSensitivity")),
    ("UniquePDR_percent", |i| sent_rate(i, "UniquePackets")),
    ("DeduplicationRate_percent", |i| {
        percent(
            i.overall.number("DuplicatePackets"),
            i.overall.number("TotalRawHearings"),
        )
        .into()
    }),
];

fn config_value(input: &RuleInput, name: &str) -> Scalar {
    input.parts.config.scalar(name).cloned().unwrap_or(Scalar::Null)
}

fn sent_rate(input: &RuleInput, numerator: &str) -> Scalar {
    percent(input.overall.number(numerator), input.overall.number("TotalSent")).into()
}

/// Map a LoRaWAN data rate (EU868) to its spreading factor.
pub fn dr_to_sf(dr: i64) -> Option<i64> {
    let sf = 12i64.checked_sub(dr)?;
    (7..=12).contains(&sf).then_some(sf)
}

fn complete_overall(parts: &SectionSet) -> Fields {
    let mut overall = parts.overall.clone();
    for (name, rule) in OVERALL_RULES {
        if overall.scalar(name).is_some() {
            continue;
        }
        let value = rule(&RuleInput {
            parts,
            overall: &overall,
        });
        if !value.is_null() {
            overall.insert((*name).to_string(), value);
        }
    }
    overall
}

/// Sum that gives `None` instead of wrapping or panicking on overflow.
fn checked_total(values: impl IntoIterator<Item = i64>) -> Option<i64> {
    values.into_iter().try_fold(0i64, i64::checked_add)
}

fn column(records: &[Record], name: &str) -> Vec<f64> {
    records.iter().filter_map(|r| r.number(name)).collect()
}

fn insert_opt(derived: &mut Fields, name: &str, value: Option<f64>) {
    if let Some(v) = value {
        derived.insert(name.to_string(), Scalar::Float(v));
    }
}

fn node_metrics(parts: &SectionSet, derived: &mut Fields) {
    let nodes = parts.nodes();
    derived.insert("node_count".into(), Scalar::Int(nodes.len() as i64));

    let covered = nodes
        .iter()
        .filter(|n| {
            n.number("UniqueReceived")
                .or_else(|| n.number("Received"))
                .is_some_and(|v| v > 0.0)
        })
        .count();
    let coverage = percent(Some(covered as f64), Some(nodes.len() as f64)).unwrap_or(0.0);
    derived.insert("coverage_percent".into(), Scalar::Float(coverage));

    let pdrs: Vec<Option<f64>> = nodes.iter().map(|n| n.number("PDR_percent")).collect();
    let (avg_pdr, pdr_std) = calculate_stats(&pdrs);
    insert_opt(derived, "avg_node_pdr_percent", avg_pdr);
    insert_opt(derived, "node_pdr_std", pdr_std);

    insert_opt(derived, "mean_rssi_dbm", mean(&column(nodes, "AvgRSSI_dBm")));
    insert_opt(derived, "mean_snr_db", mean(&column(nodes, "AvgSNR_dB")));

    let final_sf: Vec<f64> = nodes
        .iter()
        .filter_map(|n| {
            n.integer("FinalSF")
                .or_else(|| n.integer("FinalSF_DR").and_then(dr_to_sf))
        })
        .map(|sf| sf as f64)
        .collect();
    insert_opt(derived, "mean_final_sf", mean(&final_sf));

    // First-row heuristics read node 0 in file order.
    let first = nodes.first();
    let initial_sf = first
        .and_then(|n| n.integer("InitSF_DR").and_then(dr_to_sf))
        .or_else(|| first.and_then(|n| n.integer("InitialSF")))
        .or_else(|| parts.config.integer("DefaultSF"));
    if let Some(sf) = initial_sf {
        derived.insert("initial_sf".into(), Scalar::Int(sf));
    }
    let initial_tp = first
        .and_then(|n| n.number("InitTP_dBm"))
        .or_else(|| parts.config.number("DefaultTP_dBm"));
    insert_opt(derived, "initial_tp_dbm", initial_tp);
}

fn gateway_metrics(parts: &SectionSet, derived: &mut Fields) {
    let gateways = parts.gateways();
    derived.insert("gateway_count".into(), Scalar::Int(gateways.len() as i64));
    if gateways.is_empty() {
        return;
    }

    let hearings = checked_total(gateways.iter().filter_map(|g| g.integer("RawHearings")));
    if let Some(hearings) = hearings {
        derived.insert("total_hearings".into(), Scalar::Int(hearings));
    }

    let loads = column(gateways, "LoadPercentage");
    let Some(load_mean) = mean(&loads) else {
        return;
    };
    let load_std = sample_std(&loads).unwrap_or(0.0);
    let load_cv = if load_mean > 0.0 { load_std / load_mean } else { 0.0 };
    let ideal = 100.0 / gateways.len() as f64;
    let balance = loads.iter().map(|l| (l - ideal).abs()).sum::<f64>() / loads.len() as f64;

    derived.insert("load_mean".into(), Scalar::Float(load_mean));
    derived.insert("load_std".into(), Scalar::Float(load_std));
    derived.insert("load_cv".into(), Scalar::Float(load_cv));
    derived.insert("balance_score".into(), Scalar::Float(balance));
}

/// Node column summed into `sum_name` and checked against an overall total.
struct CrossCheck {
    column: &'static str,
    sum_name: &'static str,
    total: &'static str,
}

const CROSS_CHECKS: [CrossCheck; 3] = [
    CrossCheck { column: "Sent", sum_name: "node_sent_sum", total: "TotalSent" },
    CrossCheck { column: "Received", sum_name: "node_received_sum", total: "TotalReceived" },
    CrossCheck { column: "Collisions", sum_name: "node_collision_sum", total: "TotalCollisions" },
];

/// Advisory only: a disagreement becomes a diagnostic, never an error.
fn cross_check(
    nodes: &[Record],
    check: &CrossCheck,
    overall: &Fields,
    derived: &mut Fields,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let values: Vec<i64> = nodes.iter().filter_map(|n| n.integer(check.column)).collect();
    if values.is_empty() {
        return;
    }
    let Some(sum) = checked_total(values) else {
        log::debug!("Skipping {}: node {} sum overflows", check.sum_name, check.column);
        return;
    };
    derived.insert(check.sum_name.to_string(), Scalar::Int(sum));

    if let Some(reported) = overall.integer(check.total) {
        if reported != sum {
            diagnostics.push(Diagnostic::CrossCheckMismatch {
                check: format!("{} vs sum of node {}", check.total, check.column),
                reported: reported as f64,
                computed: sum as f64,
            });
        }
    }
}

/// Build the final report for `source_id` from its parsed sections.
pub fn assemble(source_id: impl Into<String>, parts: SectionSet) -> Report {
    let overall = complete_overall(&parts);
    let mut derived = Fields::new();
    let mut diagnostics = parts.diagnostics.clone();

    node_metrics(&parts, &mut derived);
    gateway_metrics(&parts, &mut derived);

    for check in &CROSS_CHECKS {
        cross_check(parts.nodes(), check, &overall, &mut derived, &mut diagnostics);
    }

    if let Some(sent) = overall.number("TotalSent") {
        let devices = overall.number("NumberOfNodes").unwrap_or(0.0).max(1.0);
        derived.insert(
            "packets_per_device".into(),
            Scalar::Int((sent / devices).round() as i64),
        );
    }

    derived.insert("_warnings".into(), Scalar::Int(diagnostics.len() as i64));

    let SectionSet {
        metadata,
        config,
        sections,
        tables,
        ..
    } = parts;
    Report::new(
        source_id.into(),
        metadata,
        config,
        overall,
        sections,
        tables,
        derived,
        diagnostics,
    )
}
