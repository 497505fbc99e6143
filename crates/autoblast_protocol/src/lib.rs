//! Shared types for the autoblast pipeline.
//!
//! Everything that crosses a crate boundary lives here: the records and
//! batches handed from the loader to the dispatcher, the job outcomes handed
//! back, and the output-format mini-language that tells the aggregator how to
//! read the alignment tool's tabular output.
//!
//! # Output format
//!
//! ```text
//! [<code>] [delim=<char>] <column> <column> ...
//! ```
//!
//! The numeric code and the delimiter token are both optional. Without a
//! `delim=` token the delimiter is a single space.

pub mod defaults;
pub mod outfmt;
pub mod paths;
pub mod types;

pub use outfmt::{OutputFormat, OutputFormatError};
pub use types::{Batch, JobOutcome, JobReport, Record};
