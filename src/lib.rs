//! # lorastats - result analysis for ns-3 LoRaWAN simulations
//!
//! This library turns the semi-structured `*_results.csv` files written by
//! the LoRaWAN scenario runners into typed reports and cross-run summaries.
//!
//! ## Overview
//!
//! A results file is a sequence of named sections. Some hold `key,value`
//! pairs (`CONFIGURATION`, `OVERALL_STATS`, `INTERFERENCE_STATS`,
//! `CAPTURE_EFFECT_ANALYSIS`), others an embedded CSV table
//! (`PER_NODE_STATS`, `PER_GATEWAY_STATS`). Field names drifted across
//! format revisions; declarative alias tables map every historical
//! spelling onto one canonical name.
//!
//! ## Key Features
//!
//! - **Never aborts on bad data**: malformed values become `Null`, short rows
//!   are skipped, and every problem is returned as a diagnostic
//! - **Derived metrics**: PDR, drop/collision rates, coverage, load balance,
//!   with guarded division and explicit values always taking precedence
//! - **Order-independent aggregation** grouped by spreading factor, traffic
//!   interval, gateway count, configuration or any field
//! - **Parallel parsing** with an optional compressed parse cache
//!
//! ## Architecture
//!
//! - `analysis::tokenizer`: section boundaries and comment lines
//! - `analysis::schema`: field specs, aliases and built-in tables
//! - `analysis::section`: key/value and table section parsers
//! - `analysis::assembler`: report assembly and derived metrics
//! - `analysis::aggregate`: cross-file aggregation and best-group selection
//! - `analysis::engine`: single-file and batch entry points
//! - `config` / `config_loader`: YAML analysis settings
//! - `utils`: input discovery for the CLI
//!
//! ## Example Usage
//!
//! ```rust
//! use lorastats::analysis::{aggregate, parse_report, GroupBy, ParseOptions, ReportSchema};
//!
//! let text = "OVERALL_STATS\nTotalSent,100\nTotalReceived,80\nPER_NODE_STATS\nNodeID,Sent\n0,100\n";
//! let report = parse_report("sf7_results.csv", text, &ReportSchema::builtin(), &ParseOptions::default())?;
//! let rows = aggregate(&[report], |r| GroupBy::SpreadingFactor.key(r));
//! assert_eq!(rows[0].mean("PDR_percent"), Some(80.0));
//! # Ok::<(), lorastats::analysis::ParseError>(())
//! ```
//!
//! ## Error Handling
//!
//! Only a missing required section is an error for a single file
//! (`ParseError`). Application code uses `color_eyre` for error reporting
//! with context.

pub mod analysis;
pub mod config;
pub mod config_loader;
pub mod utils;
