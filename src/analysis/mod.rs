//! Report parsing and aggregation for LoRaWAN simulation results.
//!
//! Text goes in through [`engine::parse_report`] / [`engine::parse_reports`];
//! immutable [`Report`]s come out and can be folded into [`AggregateRow`]s.

pub mod aggregate;
pub mod assembler;
pub mod cache;
pub mod diagnostics;
pub mod engine;
pub mod group_key;
pub mod report;
pub mod scalar;
pub mod schema;
pub mod section;
pub mod stats;
pub mod tokenizer;
pub mod types;

pub use aggregate::{aggregate, best_of, AggregateRow, Direction, FieldStats, GroupKey};
pub use assembler::{assemble, SectionSet};
pub use cache::{CacheError, ReportCache};
pub use diagnostics::{Diagnostic, ParseError};
pub use engine::{parse_report, parse_reports, ParseOptions, ParsedBatch};
pub use group_key::GroupBy;
pub use report::{generate_json_report, generate_text_report};
pub use scalar::{coerce, Scalar, TypeTag};
pub use schema::{FieldSpec, MissingPolicy, ReportSchema, SectionSchema, UnknownFieldPolicy};
pub use types::*;
