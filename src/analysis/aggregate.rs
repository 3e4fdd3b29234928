//! Cross-file aggregation of parsed reports into per-group summary rows.
//!
//! The fold is order independent: members of a group are sorted by
//! `source_id` and each field's values are sorted before summing, so
//! `aggregate(reports)` and `aggregate(reversed(reports))` agree bit for bit.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::stats::{mean, sample_std};
use super::types::Report;

/// Group identifier. Numeric keys order numerically, text keys lexically,
/// and `Unknown` sorts after everything else.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum GroupKey {
    Int(i64),
    Text(String),
    Unknown,
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupKey::Int(i) => write!(f, "{}", i),
            GroupKey::Text(s) => f.write_str(s),
            GroupKey::Unknown => f.write_str("Unknown"),
        }
    }
}

/// Summary of one numeric field over the reports that define it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldStats {
    /// Number of reports with a defined value (the per-field valid N).
    pub count: usize,
    pub sum: f64,
    pub mean: f64,
    /// Sample standard deviation; `None` below two values.
    pub std: Option<f64>,
    pub min: f64,
    pub max: f64,
}

impl FieldStats {
    fn from_values(mut values: Vec<f64>) -> Option<Self> {
        values.sort_by(f64::total_cmp);
        let mean = mean(&values)?;
        Some(Self {
            count: values.len(),
            sum: values.iter().sum(),
            mean,
            std: sample_std(&values),
            min: values[0],
            max: values[values.len() - 1],
        })
    }
}

/// One aggregated group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateRow {
    pub key: GroupKey,
    pub report_count: usize,
    /// Contributing `source_id`s, lexically sorted.
    pub sources: Vec<String>,
    pub fields: BTreeMap<String, FieldStats>,
}

impl AggregateRow {
    pub fn stats(&self, field: &str) -> Option<&FieldStats> {
        self.fields.get(field)
    }

    pub fn mean(&self, field: &str) -> Option<f64> {
        self.stats(field).map(|s| s.mean)
    }
}

/// Group `reports` with `key_fn` and summarise every numeric overall and
/// derived field. Rows come back ordered by key.
pub fn aggregate<F>(reports: &[Report], key_fn: F) -> Vec<AggregateRow>
where
    F: Fn(&Report) -> GroupKey,
{
    let mut groups: BTreeMap<GroupKey, Vec<&Report>> = BTreeMap::new();
    for report in reports {
        groups.entry(key_fn(report)).or_default().push(report);
    }

    groups
        .into_iter()
        .map(|(key, mut members)| {
            members.sort_by(|a, b| a.source_id().cmp(b.source_id()));

            let mut values: BTreeMap<String, Vec<f64>> = BTreeMap::new();
            for report in &members {
                for (name, v) in report.numeric_fields() {
                    if v.is_finite() {
                        values.entry(name.to_string()).or_default().push(v);
                    }
                }
            }

            let fields = values
                .into_iter()
                .filter_map(|(name, vals)| FieldStats::from_values(vals).map(|s| (name, s)))
                .collect();

            log::debug!("Group {}: {} reports", key, members.len());
            AggregateRow {
                key,
                report_count: members.len(),
                sources: members.iter().map(|r| r.source_id().to_string()).collect(),
                fields,
            }
        })
        .collect()
}

/// Which end of a metric counts as best.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    #[default]
    Highest,
    Lowest,
}

/// The row with the best mean for `field`; exact ties go to the lowest key.
/// Rows without the field are not considered.
pub fn best_of<'a>(rows: &'a [AggregateRow], field: &str, direction: Direction) -> Option<&'a AggregateRow> {
    let mut best: Option<(&AggregateRow, f64)> = None;
    for row in rows {
        let Some(value) = row.mean(field) else {
            continue;
        };
        let replace = match best {
            None => true,
            Some((current, current_value)) => {
                let better = match direction {
                    Direction::Highest => value > current_value,
                    Direction::Lowest => value < current_value,
                };
                better || (value == current_value && row.key < current.key)
            }
        };
        if replace {
            best = Some((row, value));
        }
    }
    best.map(|(row, _)| row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::assembler::{assemble, SectionSet};
    use crate::analysis::scalar::Scalar;
    use crate::analysis::types::Fields;

    fn report(id: &str, sf: Option<i64>, pdr: Option<f64>, extra: &[(&str, f64)]) -> Report {
        let mut overall = Fields::new();
        if let Some(sf) = sf {
            overall.insert("SpreadingFactor".into(), Scalar::Int(sf));
        }
        if let Some(pdr) = pdr {
            overall.insert("PDR_percent".into(), Scalar::Float(pdr));
        }
        for (k, v) in extra {
            overall.insert(k.to_string(), Scalar::Float(*v));
        }
        assemble(
            id,
            SectionSet {
                overall,
                ..Default::default()
            },
        )
    }

    fn by_sf(r: &Report) -> GroupKey {
        r.overall()
            .get("SpreadingFactor")
            .and_then(Scalar::as_i64)
            .map(GroupKey::Int)
            .unwrap_or(GroupKey::Unknown)
    }

    #[test]
    fn test_mean_pdr_per_group() {
        let reports = vec![
            report("a", Some(7), Some(90.0), &[]),
            report("b", Some(7), Some(95.0), &[]),
        ];
        let rows = aggregate(&reports, by_sf);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].key, GroupKey::Int(7));
        assert_eq!(rows[0].mean("PDR_percent"), Some(92.5));
        assert_eq!(rows[0].stats("PDR_percent").unwrap().sum, 185.0);
        assert_eq!(rows[0].sources, vec!["a", "b"]);
    }

    #[test]
    fn test_fold_is_order_independent() {
        let mut reports = vec![
            report("r1", Some(7), Some(0.1), &[("X", 1e16)]),
            report("r2", Some(7), Some(0.2), &[("X", 1.0)]),
            report("r3", Some(7), Some(0.3), &[("X", -1e16)]),
            report("r4", Some(9), Some(50.0), &[]),
        ];
        let forward = aggregate(&reports, by_sf);
        reports.reverse();
        let backward = aggregate(&reports, by_sf);
        assert_eq!(forward, backward);
    }

    #[test]
    fn test_valid_n_is_per_field() {
        let reports = vec![
            report("a", Some(7), Some(80.0), &[("Energy", 2.0)]),
            report("b", Some(7), None, &[("Energy", 4.0)]),
        ];
        let rows = aggregate(&reports, by_sf);
        let pdr = rows[0].stats("PDR_percent").unwrap();
        assert_eq!((pdr.count, pdr.mean, pdr.std), (1, 80.0, None));
        let energy = rows[0].stats("Energy").unwrap();
        assert_eq!((energy.count, energy.mean), (2, 3.0));
        assert_eq!(rows[0].report_count, 2);
    }

    #[test]
    fn test_unknown_bucket_is_kept_and_sorted_last() {
        let reports = vec![
            report("x", None, Some(10.0), &[]),
            report("y", Some(12), Some(20.0), &[]),
        ];
        let rows = aggregate(&reports, by_sf);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].key, GroupKey::Int(12));
        assert_eq!(rows[1].key, GroupKey::Unknown);
        assert_eq!(rows[1].sources, vec!["x"]);
    }

    #[test]
    fn test_best_of_tie_prefers_lowest_key() {
        let reports = vec![
            report("nine", Some(9), Some(97.0), &[]),
            report("seven", Some(7), Some(97.0), &[]),
            report("eight", Some(8), Some(60.0), &[]),
        ];
        let mut rows = aggregate(&reports, by_sf);
        rows.reverse();
        let best = best_of(&rows, "PDR_percent", Direction::Highest).unwrap();
        assert_eq!(best.key, GroupKey::Int(7));

        let worst = best_of(&rows, "PDR_percent", Direction::Lowest).unwrap();
        assert_eq!(worst.key, GroupKey::Int(8));
        assert!(best_of(&rows, "Missing", Direction::Highest).is_none());
    }

    #[test]
    fn test_group_key_order() {
        let mut keys = vec![GroupKey::Unknown, GroupKey::Text("b".into()), GroupKey::Int(12), GroupKey::Int(7)];
        keys.sort();
        assert_eq!(
            keys,
            vec![GroupKey::Int(7), GroupKey::Int(12), GroupKey::Text("b".into()), GroupKey::Unknown]
        );
        assert_eq!(GroupKey::Unknown.to_string(), "Unknown");
    }
}
