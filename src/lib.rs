//! Tracemake - makefile generation from audited build traces
//!
//! This library turns a log of file accesses and command executions into
//! a GNU make makefile: it parses trace records, classifies each command's
//! accesses into prerequisites and targets, strips redundant shell
//! wrappers from recipes and renders the result.

pub mod classify;
pub mod cli;
pub mod config;
pub mod deshell;
pub mod error;
pub mod generator;
pub mod ingest;
pub mod json_output;
pub mod makefile;
pub mod quoting;
pub mod trace_record;

pub use error::{Result, TraceError};
pub use generator::{Generation, Generator, GeneratorConfig};
pub use makefile::Makefile;
