//! Section parsers: `key,value` sections and embedded CSV tables.
//!
//! Both parsers are driven entirely by a [`SectionSchema`]; malformed
//! input is recorded as a [`Diagnostic`] and parsing carries on.

use csv::{ReaderBuilder, Trim};

use super::diagnostics::Diagnostic;
use super::scalar::{coerce_untyped, Scalar};
use super::schema::{FieldSpec, MissingPolicy, SectionSchema, UnknownFieldPolicy};
use super::tokenizer::Line;
use super::types::{Fields, Record};

/// Split one line with CSV quoting rules, trimming every field.
pub fn split_csv_line(line: &str) -> Vec<String> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(line.as_bytes());
    match reader.records().next() {
        Some(Ok(record)) => record.iter().map(str::to_string).collect(),
        _ => line.split(',').map(|t| t.trim().to_string()).collect(),
    }
}

/// Parse a `key,value` section.
///
/// Each line is split on its first comma only. Keys resolve through the
/// schema's aliases; a later occurrence of the same canonical key replaces
/// an earlier one. Lines without a comma are ignored.
pub fn parse_key_value<'a>(
    lines: impl Iterator<Item = Line<'a>>,
    schema: &SectionSchema,
    policy: UnknownFieldPolicy,
    diagnostics: &mut Vec<Diagnostic>,
) -> Fields {
    let mut fields = Fields::new();

    for line in lines {
        let Some((key, raw)) = line.text.split_once(',') else {
            continue;
        };
        let key = key.trim();
        let raw = raw.trim();
        if key.is_empty() {
            continue;
        }

        match schema.resolve(key) {
            Some(spec) => {
                let value = spec.coerce(raw);
                if spec.is_coercion_failure(raw, &value) {
                    diagnostics.push(Diagnostic::CoercionFailure {
                        section: schema.section,
                        line: line.number(),
                        field: spec.name.clone(),
                        raw: raw.to_string(),
                        expected: spec.ty,
                    });
                }
                fields.insert(spec.name.clone(), value);
            }
            None => {
                let kept = policy == UnknownFieldPolicy::PassThrough;
                diagnostics.push(Diagnostic::UnknownField {
                    section: schema.section,
                    key: key.to_string(),
                    kept,
                });
                if kept {
                    fields.insert(key.to_string(), coerce_untyped(raw));
                }
            }
        }
    }

    for spec in &schema.fields {
        if fields.contains_key(&spec.name) {
            continue;
        }
        if let Some(value) = spec.fill_missing(&fields) {
            fields.insert(spec.name.clone(), value);
        }
    }

    fields
}

/// One header column and the field it feeds.
struct Column<'s> {
    index: usize,
    name: String,
    spec: Option<&'s FieldSpec>,
    rank: usize,
}

fn map_header<'s>(
    header: &[String],
    schema: &'s SectionSchema,
    policy: UnknownFieldPolicy,
    diagnostics: &mut Vec<Diagnostic>,
) -> Vec<Column<'s>> {
    let mut columns: Vec<Column<'s>> = Vec::new();

    for (index, token) in header.iter().enumerate() {
        if token.is_empty() {
            continue;
        }
        let (name, spec, rank) = match schema.resolve_ranked(token) {
            Some((spec, rank)) => (spec.name.clone(), Some(spec), rank),
            None => {
                let kept = policy == UnknownFieldPolicy::PassThrough;
                diagnostics.push(Diagnostic::UnknownField {
                    section: schema.section,
                    key: token.clone(),
                    kept,
                });
                if !kept {
                    continue;
                }
                (token.clone(), None, 0)
            }
        };

        // Two columns feeding the same field: the preferred alias wins,
        // then the leftmost column.
        if let Some(pos) = columns.iter().position(|c| c.name == name) {
            if rank < columns[pos].rank {
                let displaced = std::mem::replace(
                    &mut columns[pos],
                    Column { index, name: name.clone(), spec, rank },
                );
                diagnostics.push(Diagnostic::ShadowedColumn {
                    section: schema.section,
                    column: header[displaced.index].clone(),
                    canonical: name,
                });
            } else {
                diagnostics.push(Diagnostic::ShadowedColumn {
                    section: schema.section,
                    column: token.clone(),
                    canonical: name,
                });
            }
            continue;
        }

        columns.push(Column { index, name, spec, rank });
    }

    columns
}

/// Parse a table section: a header row followed by data rows.
///
/// Rows whose field count differs from the header are skipped, as are rows
/// made only of empty fields. Every emitted record has the same field set:
/// the mapped header columns followed by schema fields filled through their
/// missing-value policy. Record order follows input order.
pub fn parse_table<'a>(
    mut lines: impl Iterator<Item = Line<'a>>,
    schema: &SectionSchema,
    policy: UnknownFieldPolicy,
    diagnostics: &mut Vec<Diagnostic>,
) -> Vec<Record> {
    let Some(header_line) = lines.next() else {
        diagnostics.push(Diagnostic::MissingHeader {
            section: schema.section,
        });
        return Vec::new();
    };

    let header = split_csv_line(header_line.text);
    let columns = map_header(&header, schema, policy, diagnostics);
    let filled: Vec<&FieldSpec> = schema
        .fields
        .iter()
        .filter(|spec| !columns.iter().any(|c| c.name == spec.name))
        .filter(|spec| !matches!(spec.on_missing, MissingPolicy::Null))
        .collect();

    let mut records = Vec::new();
    for line in lines {
        let tokens = split_csv_line(line.text);
        if tokens.len() != header.len() {
            diagnostics.push(Diagnostic::MalformedRow {
                section: schema.section,
                line: line.number(),
                expected: header.len(),
                found: tokens.len(),
            });
            continue;
        }
        if tokens.iter().all(|t| t.is_empty()) {
            log::trace!("{} line {}: empty row skipped", schema.section, line.number());
            continue;
        }

        let mut record = Record::with_capacity(columns.len() + filled.len());
        for column in &columns {
            let raw = tokens[column.index].as_str();
            let value = match column.spec {
                Some(spec) => {
                    let value = spec.coerce(raw);
                    if spec.is_coercion_failure(raw, &value) {
                        diagnostics.push(Diagnostic::CoercionFailure {
                            section: schema.section,
                            line: line.number(),
                            field: spec.name.clone(),
                            raw: raw.to_string(),
                            expected: spec.ty,
                        });
                    }
                    value
                }
                None => Scalar::String(raw.to_string()),
            };
            record.push(column.name.clone(), value);
        }
        for spec in &filled {
            let value = spec.fill_missing(&record).unwrap_or(Scalar::Null);
            record.push(spec.name.clone(), value);
        }
        records.push(record);
    }

    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::schema::ReportSchema;
    use crate::analysis::tokenizer::Tokenizer;
    use crate::analysis::types::{FieldSource, SectionName};

    fn parse_kv(text: &str, section: SectionName, policy: UnknownFieldPolicy) -> (Fields, Vec<Diagnostic>) {
        let schema = ReportSchema::builtin();
        let tok = Tokenizer::new(text);
        let span = tok.section_span(section).unwrap();
        let mut diags = Vec::new();
        let fields = parse_key_value(
            tok.section_lines(span),
            schema.section(section).unwrap(),
            policy,
            &mut diags,
        );
        (fields, diags)
    }

    fn parse_rows(text: &str, section: SectionName, policy: UnknownFieldPolicy) -> (Vec<Record>, Vec<Diagnostic>) {
        let schema = ReportSchema::builtin();
        let tok = Tokenizer::new(text);
        let span = tok.section_span(section).unwrap();
        let mut diags = Vec::new();
        let rows = parse_table(
            tok.section_lines(span),
            schema.section(section).unwrap(),
            policy,
            &mut diags,
        );
        (rows, diags)
    }

    #[test]
    fn test_kv_splits_on_first_comma() {
        let (fields, _) = parse_kv(
            "CONFIGURATION\nPropagationModel,LogDistance, exponent 3.76\n",
            SectionName::Configuration,
            UnknownFieldPolicy::PassThrough,
        );
        assert_eq!(
            fields.get("PropagationModel"),
            Some(&Scalar::String("LogDistance, exponent 3.76".into()))
        );
    }

    #[test]
    fn test_kv_alias_and_last_occurrence_wins() {
        let (fields, diags) = parse_kv(
            "OVERALL_STATS\nUL_Sent,50\nstray line\nTotalSent,60\n",
            SectionName::OverallStats,
            UnknownFieldPolicy::PassThrough,
        );
        assert_eq!(fields.get("TotalSent"), Some(&Scalar::Int(60)));
        assert!(diags.is_empty());
    }

    #[test]
    fn test_kv_unknown_policy() {
        let text = "OVERALL_STATS\nEnergy_J,1.5\nTotalSent,5\n";
        let (kept, diags) = parse_kv(text, SectionName::OverallStats, UnknownFieldPolicy::PassThrough);
        assert_eq!(kept.get("Energy_J"), Some(&Scalar::Float(1.5)));
        assert!(matches!(&diags[0], Diagnostic::UnknownField { kept: true, .. }));

        let (dropped, diags) = parse_kv(text, SectionName::OverallStats, UnknownFieldPolicy::Drop);
        assert!(!dropped.contains_key("Energy_J"));
        assert!(matches!(&diags[0], Diagnostic::UnknownField { kept: false, .. }));
    }

    #[test]
    fn test_kv_coercion_failure_is_null_and_recorded() {
        let (fields, diags) = parse_kv(
            "OVERALL_STATS\nTotalSent,12#\nTotalReceived,NA\n",
            SectionName::OverallStats,
            UnknownFieldPolicy::PassThrough,
        );
        assert_eq!(fields.get("TotalSent"), Some(&Scalar::Null));
        assert_eq!(fields.get("TotalReceived"), Some(&Scalar::Null));
        assert_eq!(diags.len(), 1);
        assert!(matches!(&diags[0], Diagnostic::CoercionFailure { line: 2, .. }));
    }

    #[test]
    fn test_table_skips_short_rows() {
        let (rows, diags) = parse_rows(
            "PER_NODE_STATS\na,b,c\n1,2\n1,2,3\n",
            SectionName::PerNodeStats,
            UnknownFieldPolicy::PassThrough,
        );
        assert_eq!(rows.len(), 1);
        assert_eq!(
            diags.iter().filter(|d| matches!(d, Diagnostic::MalformedRow { .. })).count(),
            1
        );
    }

    #[test]
    fn test_table_skips_empty_rows_and_keeps_order() {
        let (rows, _) = parse_rows(
            "PER_NODE_STATS\nNodeID,Sent,Received\n0,10,8\n,,\n1,10,5\n",
            SectionName::PerNodeStats,
            UnknownFieldPolicy::PassThrough,
        );
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].integer("NodeID"), Some(0));
        assert_eq!(rows[1].integer("NodeID"), Some(1));
    }

    #[test]
    fn test_table_fills_derived_columns_uniformly() {
        let (rows, _) = parse_rows(
            "PER_NODE_STATS\nNodeID,Sent,Received\n0,10,8\n1,0,0\n2,NA,3\n",
            SectionName::PerNodeStats,
            UnknownFieldPolicy::PassThrough,
        );
        assert_eq!(rows[0].number("PDR_percent"), Some(80.0));
        assert_eq!(rows[0].integer("Drops"), Some(2));
        assert_eq!(rows[1].number("PDR_percent"), Some(0.0));
        assert_eq!(rows[2].get("PDR_percent"), Some(&Scalar::Null));

        let names: Vec<Vec<&str>> = rows.iter().map(|r| r.names().collect()).collect();
        assert!(names.windows(2).all(|w| w[0] == w[1]));
        assert!(!names[0].contains(&"GatewayDistributionUnique"));
    }

    #[test]
    fn test_table_quoted_fields_and_unknown_columns() {
        let (rows, diags) = parse_rows(
            "PER_NODE_STATS\nNodeID,Note,Sent\n0,\"late, retried\",4\n",
            SectionName::PerNodeStats,
            UnknownFieldPolicy::PassThrough,
        );
        assert_eq!(rows[0].get("Note"), Some(&Scalar::String("late, retried".into())));
        assert_eq!(rows[0].integer("Sent"), Some(4));
        assert!(matches!(&diags[0], Diagnostic::UnknownField { kept: true, .. }));

        let (rows, _) = parse_rows(
            "PER_NODE_STATS\nNodeID,Note,Sent\n0,x,4\n",
            SectionName::PerNodeStats,
            UnknownFieldPolicy::Drop,
        );
        assert!(!rows[0].contains("Note"));
    }

    #[test]
    fn test_table_preferred_alias_shadows_legacy_column() {
        let (rows, diags) = parse_rows(
            "PER_NODE_STATS\nNodeID,Collisions,Losses\n0,3,5\n",
            SectionName::PerNodeStats,
            UnknownFieldPolicy::PassThrough,
        );
        assert_eq!(rows[0].integer("Collisions"), Some(5));
        assert!(diags.iter().any(|d| matches!(
            d,
            Diagnostic::ShadowedColumn { column, .. } if column == "Collisions"
        )));
    }

    #[test]
    fn test_table_without_header() {
        let schema = ReportSchema::builtin();
        let mut diags = Vec::new();
        let rows = parse_table(
            std::iter::empty(),
            schema.section(SectionName::PerGatewayStats).unwrap(),
            UnknownFieldPolicy::PassThrough,
            &mut diags,
        );
        assert!(rows.is_empty());
        assert_eq!(
            diags,
            vec![Diagnostic::MissingHeader {
                section: SectionName::PerGatewayStats
            }]
        );
    }
}
