//! Parsing entry points: one report text, or a batch in parallel.
//!
//! The engine never touches the filesystem. Callers hand it
//! `(identifier, text)` pairs and get back immutable [`Report`]s.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use rayon::prelude::*;
use regex::Regex;

use super::assembler::{assemble, SectionSet};
use super::diagnostics::ParseError;
use super::schema::{ReportSchema, UnknownFieldPolicy};
use super::section::{parse_key_value, parse_table};
use super::tokenizer::Tokenizer;
use super::types::{Report, SectionKind, SectionName};

static SCENARIO_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Scenario\s+(\d+)").expect("Invalid scenario_number regex"));

/// Per-call parsing switches.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParseOptions {
    /// Overrides every section's own unknown-field policy when set.
    pub unknown_fields: Option<UnknownFieldPolicy>,
}

/// Result of parsing a batch: reports and fatal failures, both sorted by
/// source identifier.
#[derive(Debug, Default)]
pub struct ParsedBatch {
    pub reports: Vec<Report>,
    pub failures: Vec<ParseError>,
}

/// Extract title, scenario number, generation time and simulation
/// parameters from `#` header comments.
fn header_metadata(tokenizer: &Tokenizer) -> BTreeMap<String, String> {
    let mut metadata = BTreeMap::new();
    for line in tokenizer.comments() {
        let body = line.text.trim_start_matches('#').trim();
        if body.starts_with("Scenario") {
            metadata.insert("title".to_string(), body.to_string());
            // "Scenario 03" is stored as "3"
            if let Some(number) = SCENARIO_NUMBER
                .captures(body)
                .and_then(|caps| caps[1].parse::<u64>().ok())
            {
                metadata.insert("scenario_number".to_string(), number.to_string());
            }
        } else if let Some(generated) = body.strip_prefix("Generated:") {
            metadata.insert("generated".to_string(), generated.trim().to_string());
        } else if body.contains("Devices:") || body.contains("Gateways:") {
            metadata.insert("simulation_params".to_string(), body.to_string());
        }
    }
    metadata
}

/// Parse one report file.
///
/// Only a missing required section is an error; every other problem is
/// recorded on the returned report.
pub fn parse_report(
    source_id: &str,
    text: &str,
    schema: &ReportSchema,
    options: &ParseOptions,
) -> Result<Report, ParseError> {
    let tokenizer = Tokenizer::new(text);

    for &section in schema.required_sections() {
        if tokenizer.find_section(section).is_none() {
            return Err(ParseError::MissingRequiredSection {
                source_id: source_id.to_string(),
                section,
            });
        }
    }

    let mut parts = SectionSet {
        metadata: header_metadata(&tokenizer),
        ..Default::default()
    };

    for section in SectionName::ALL {
        let (Some(span), Some(section_schema)) = (tokenizer.section_span(section), schema.section(section)) else {
            continue;
        };
        let policy = options.unknown_fields.unwrap_or(section_schema.unknown_fields);
        let lines = tokenizer.section_lines(span);

        match section.kind() {
            SectionKind::Table => {
                let rows = parse_table(lines, section_schema, policy, &mut parts.diagnostics);
                log::trace!("{}: {} rows in {}", source_id, rows.len(), section);
                parts.tables.insert(section, rows);
            }
            SectionKind::KeyValue => {
                let fields = parse_key_value(lines, section_schema, policy, &mut parts.diagnostics);
                match section {
                    SectionName::Configuration => parts.config = fields,
                    SectionName::OverallStats => parts.overall = fields,
                    _ => {
                        parts.sections.insert(section, fields);
                    }
                }
            }
        }
    }

    let report = assemble(source_id, parts);
    log::debug!(
        "Parsed {}: {} nodes, {} gateways, {} diagnostics",
        source_id,
        report.nodes().len(),
        report.gateways().len(),
        report.diagnostics().len()
    );
    Ok(report)
}

/// Parse many report texts in parallel.
///
/// Output order depends only on the identifiers, never on scheduling.
pub fn parse_reports(
    inputs: &[(String, String)],
    schema: &ReportSchema,
    options: &ParseOptions,
) -> ParsedBatch {
    log::info!("Parsing {} report files in parallel...", inputs.len());

    let results: Vec<Result<Report, ParseError>> = inputs
        .par_iter()
        .map(|(id, text)| parse_report(id, text, schema, options))
        .collect();

    let mut batch = ParsedBatch::default();
    for result in results {
        match result {
            Ok(report) => batch.reports.push(report),
            Err(e) => batch.failures.push(e),
        }
    }
    batch.reports.sort_by(|a, b| a.source_id().cmp(b.source_id()));
    batch.failures.sort_by(|a, b| a.source_id().cmp(b.source_id()));

    log::info!(
        "Parsed {} reports, {} failed",
        batch.reports.len(),
        batch.failures.len()
    );
    batch
}
