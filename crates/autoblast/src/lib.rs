//! Autoblast: batch spreadsheet sequences through an external alignment tool.
//!
//! The library holds the pipeline stages; the `autoblast` binary wraps them
//! in a CLI.
//!
//! - [`loader`]: input file -> unique, complete records
//! - [`batcher`]: records -> fixed-size batches
//! - [`aggregator`]: job reports -> result table
//! - [`table`]: result table and retry manifest writers
//! - [`pipeline`]: the stages wired together with the worker's dispatcher

pub mod aggregator;
pub mod batcher;
pub mod loader;
pub mod pipeline;
pub mod table;

pub use pipeline::{run_pipeline, PipelineError, RunConfig, RunSummary};
