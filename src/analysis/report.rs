//! Result documents and their JSON / text renderings.
//!
//! Generates both JSON and human-readable text output for the CLI.

use std::fs;
use std::path::Path;

use chrono::Utc;
use color_eyre::eyre::{Context, Result};
use serde::{Deserialize, Serialize};

use super::aggregate::{AggregateRow, Direction, GroupKey};
use super::types::{FieldSource, Report};

/// Metrics shown in text output, in display order.
pub const HEADLINE_METRICS: [&str; 6] = [
    "PDR_percent",
    "DropRate_percent",
    "CollisionRate_percent",
    "coverage_percent",
    "avg_node_pdr_percent",
    "load_cv",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisMetadata {
    pub analysis_timestamp: String,
    pub input_files: usize,
    pub parsed_reports: usize,
    pub failed_reports: usize,
}

impl AnalysisMetadata {
    pub fn new(input_files: usize, parsed_reports: usize, failed_reports: usize) -> Self {
        Self {
            analysis_timestamp: Utc::now().to_rfc3339(),
            input_files,
            parsed_reports,
            failed_reports,
        }
    }
}

/// Output of `summary`: every parsed report plus the files that failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryDocument {
    pub metadata: AnalysisMetadata,
    pub reports: Vec<Report>,
    pub failures: Vec<String>,
}

/// Output of `aggregate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateDocument {
    pub metadata: AnalysisMetadata,
    pub group_by: String,
    pub best_metric: String,
    pub best_direction: Direction,
    pub best_group: Option<GroupKey>,
    pub rows: Vec<AggregateRow>,
}

/// Write any result document as pretty JSON.
pub fn generate_json_report<T: Serialize>(document: &T, output_path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(document).context("Failed to serialize report to JSON")?;

    fs::write(output_path, json)
        .with_context(|| format!("Failed to write JSON report to {}", output_path.display()))?;

    log::info!("JSON report written to {}", output_path.display());
    Ok(())
}

fn fmt_opt(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.2}", v),
        None => "NA".to_string(),
    }
}

/// One-line description of a parsed report.
pub fn report_line(report: &Report) -> String {
    let overall = report.overall();
    let derived = report.derived();
    format!(
        "{}: sent={} received={} PDR={}% nodes={} gateways={} warnings={}",
        report.source_id(),
        overall.integer("TotalSent").map_or("NA".to_string(), |v| v.to_string()),
        overall.integer("TotalReceived").map_or("NA".to_string(), |v| v.to_string()),
        fmt_opt(overall.number("PDR_percent")),
        derived.integer("node_count").unwrap_or(0),
        derived.integer("gateway_count").unwrap_or(0),
        report.diagnostics().len(),
    )
}

fn aggregate_lines(document: &AggregateDocument) -> Vec<String> {
    let mut lines = Vec::new();
    for row in &document.rows {
        lines.push(format!(
            "{} = {}  ({} reports)",
            document.group_by, row.key, row.report_count
        ));
        for metric in HEADLINE_METRICS {
            let Some(stats) = row.stats(metric) else {
                continue;
            };
            lines.push(format!(
                "  {:<24} mean {:>8.2}  std {:>8}  min {:>8.2}  max {:>8.2}  n={}",
                metric,
                stats.mean,
                fmt_opt(stats.std),
                stats.min,
                stats.max,
                stats.count
            ));
        }
        lines.push(String::new());
    }

    match &document.best_group {
        Some(key) => lines.push(format!(
            "Best {} by {} ({:?}): {}",
            document.group_by, document.best_metric, document.best_direction, key
        )),
        None => lines.push(format!("No group defines {}", document.best_metric)),
    }
    lines
}

/// Write the human-readable aggregation report.
pub fn generate_text_report(document: &AggregateDocument, output_path: &Path) -> Result<()> {
    let mut lines: Vec<String> = Vec::new();

    lines.push("=".repeat(80));
    lines.push("                    LORAWAN SIMULATION RESULTS AGGREGATE".to_string());
    lines.push("=".repeat(80));
    lines.push(String::new());

    lines.push(format!("Analysis Date: {}", document.metadata.analysis_timestamp));
    lines.push(format!("Input Files: {}", document.metadata.input_files));
    lines.push(format!("Parsed Reports: {}", document.metadata.parsed_reports));
    lines.push(format!("Failed Reports: {}", document.metadata.failed_reports));
    lines.push(format!("Grouped By: {}", document.group_by));
    lines.push(String::new());
    lines.push("-".repeat(80));
    lines.extend(aggregate_lines(document));
    lines.push(String::new());

    fs::write(output_path, lines.join("\n"))
        .with_context(|| format!("Failed to write text report to {}", output_path.display()))?;

    log::info!("Text report written to {}", output_path.display());
    Ok(())
}

pub fn print_summary(document: &AggregateDocument) {
    println!("\n=== LORAWAN RESULTS AGGREGATE ===\n");
    println!("Reports: {} parsed, {} failed", document.metadata.parsed_reports, document.metadata.failed_reports);
    println!("Groups: {}\n", document.rows.len());
    for line in aggregate_lines(document) {
        println!("{}", line);
    }
    println!();
}
