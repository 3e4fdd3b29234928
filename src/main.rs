//! Result analysis CLI for ns-3 LoRaWAN simulations.
//!
//! Parses `*_results.csv` report files, validates them and aggregates
//! their metrics across runs.

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{bail, Context, Result};
use env_logger::Env;

use lorastats::analysis::report::{
    generate_json_report, generate_text_report, print_summary, report_line, AggregateDocument,
    AnalysisMetadata, SummaryDocument,
};
use lorastats::analysis::{
    aggregate, best_of, parse_reports, GroupBy, ParseOptions, ParsedBatch, ReportCache,
    UnknownFieldPolicy,
};
use lorastats::config::AnalysisConfig;
use lorastats::config_loader::{apply_overrides, load_or_default, ConfigOverrides};
use lorastats::utils::{discover_inputs, read_inputs};

#[derive(Parser, Debug)]
#[command(name = "lorastats")]
#[command(about = "Parse and aggregate ns-3 LoRaWAN simulation results")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Analysis settings (YAML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Output directory for reports
    #[arg(short, long, default_value = "analysis_output", global = true)]
    output: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    /// Number of parallel workers (0 = auto-detect)
    #[arg(short = 'j', long, default_value = "0", global = true)]
    threads: usize,

    /// Parse cache file; unchanged reports are not re-parsed
    #[arg(long, global = true)]
    cache: Option<PathBuf>,

    /// Policy for fields without a known alias (pass_through or drop),
    /// overriding the config
    #[arg(long, global = true)]
    unknown_fields: Option<UnknownFieldPolicy>,

    /// Log every parse diagnostic as a warning
    #[arg(long, global = true)]
    show_warnings: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Parse reports and print one line per file
    Summary {
        /// Report files or directories to search
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
    },

    /// Aggregate reports by group and pick the best group
    Aggregate {
        /// sf, interval, gateways, configuration or field:NAME
        #[arg(long)]
        group_by: Option<GroupBy>,

        /// Metric used to pick the best group
        #[arg(long)]
        best: Option<String>,

        /// Lower values of the metric are better
        #[arg(long)]
        lowest: bool,

        /// Report files or directories to search
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
    },

    /// Report every diagnostic; fails when any file cannot be parsed
    Validate {
        /// Report files or directories to search
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
    },
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    env_logger::Builder::from_env(Env::default().default_filter_or(&cli.log_level)).init();

    if cli.threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(cli.threads)
            .build_global()
            .context("Failed to configure thread pool")?;
    }

    let mut config = load_or_default(cli.config.as_deref())?;
    let options = ParseOptions {
        unknown_fields: cli.unknown_fields,
    };

    match &cli.command {
        Commands::Summary { inputs } => {
            let (input_count, batch) = load_reports(&cli, &config, &options, inputs)?;
            fs::create_dir_all(&cli.output).with_context(|| {
                format!("Failed to create output directory: {}", cli.output.display())
            })?;

            println!("\n=== LORAWAN REPORT SUMMARY ===\n");
            for report in &batch.reports {
                println!("{}", report_line(report));
            }
            println!();

            let document = SummaryDocument {
                metadata: AnalysisMetadata::new(input_count, batch.reports.len(), batch.failures.len()),
                failures: batch.failures.iter().map(|f| f.to_string()).collect(),
                reports: batch.reports,
            };
            generate_json_report(&document, &cli.output.join("reports.json"))?;
        }
        Commands::Aggregate {
            group_by,
            best,
            lowest,
            inputs,
        } => {
            let overrides = ConfigOverrides {
                group_by: group_by.clone(),
                best_metric: best.clone(),
                lowest: *lowest,
            };
            apply_overrides(&mut config, &overrides)?;

            let (input_count, batch) = load_reports(&cli, &config, &options, inputs)?;
            fs::create_dir_all(&cli.output).with_context(|| {
                format!("Failed to create output directory: {}", cli.output.display())
            })?;

            let group_by = config.group_by.clone();
            let rows = aggregate(&batch.reports, |r| group_by.key(r));
            let best_group = best_of(&rows, &config.best_metric, config.best_direction).map(|r| r.key.clone());

            let document = AggregateDocument {
                metadata: AnalysisMetadata::new(input_count, batch.reports.len(), batch.failures.len()),
                group_by: config.group_by.to_string(),
                best_metric: config.best_metric.clone(),
                best_direction: config.best_direction,
                best_group,
                rows,
            };

            generate_json_report(&document, &cli.output.join("aggregate.json"))?;
            generate_text_report(&document, &cli.output.join("aggregate.txt"))?;
            print_summary(&document);
        }
        Commands::Validate { inputs } => {
            let (_, batch) = load_reports(&cli, &config, &options, inputs)?;

            for report in &batch.reports {
                if report.diagnostics().is_empty() {
                    println!("OK    {}", report.source_id());
                    continue;
                }
                println!("WARN  {} ({} diagnostics)", report.source_id(), report.diagnostics().len());
                for diagnostic in report.diagnostics() {
                    println!("        {}", diagnostic);
                }
            }
            for failure in &batch.failures {
                println!("FAIL  {}", failure);
            }

            if !batch.failures.is_empty() {
                bail!("{} report files failed to parse", batch.failures.len());
            }
        }
    }

    Ok(())
}

/// Discover, read and parse the reports named by `inputs`.
fn load_reports(
    cli: &Cli,
    config: &AnalysisConfig,
    options: &ParseOptions,
    inputs: &[PathBuf],
) -> Result<(usize, ParsedBatch)> {
    let paths = discover_inputs(inputs, &config.file_suffix)?;
    let texts = read_inputs(&paths)?;
    let schema = config.schema();

    let batch = match &cli.cache {
        Some(cache_path) => parse_with_cache(cache_path, &texts, config, options)?,
        None => parse_reports(&texts, &schema, options),
    };

    for failure in &batch.failures {
        log::warn!("Skipping {}", failure);
    }
    if cli.show_warnings {
        for report in &batch.reports {
            for diagnostic in report.diagnostics() {
                log::warn!("{}: {}", report.source_id(), diagnostic);
            }
        }
    }

    Ok((paths.len(), batch))
}

fn parse_with_cache(
    cache_path: &Path,
    texts: &[(String, String)],
    config: &AnalysisConfig,
    options: &ParseOptions,
) -> Result<ParsedBatch> {
    let mut cache = ReportCache::load(cache_path).unwrap_or_else(|e| {
        log::warn!("Ignoring unreadable cache {}: {}", cache_path.display(), e);
        ReportCache::new()
    });

    let batch = cache.parse_all(texts, &config.schema(), options, &config.cache_salt(options));

    cache
        .save(cache_path)
        .with_context(|| format!("Failed to write cache {}", cache_path.display()))?;
    Ok(batch)
}
