//! Shared utilities: input discovery for the CLI.

pub mod discovery;

pub use discovery::{discover_inputs, read_inputs};
