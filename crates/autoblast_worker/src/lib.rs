//! Batch dispatcher for the external alignment tool.
//!
//! A [`Dispatcher`] runs one subprocess per [`autoblast_protocol::Batch`],
//! at most `max_concurrent` at a time, each under its own timeout. Results come
//! back in completion order, tagged with their batch index.

pub mod dispatcher;
pub mod job;
pub mod process;

pub use dispatcher::Dispatcher;
pub use job::{build_command, filter_warnings, run_job, JobConfig};

use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort a whole dispatch run.
///
/// Per-job timeouts and non-zero exits are not errors; they are reported as
/// [`autoblast_protocol::JobOutcome`] values.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Failed to start alignment tool '{}': {source}", binary.display())]
    Spawn {
        binary: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[Batch {batch_index}] Failed to write query file: {source}")]
    QueryFile {
        batch_index: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("[Batch {batch_index}] I/O error while waiting for alignment tool: {source}")]
    Io {
        batch_index: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("Job task failed: {0}")]
    Task(String),

    #[error("Job permit pool closed")]
    PoolClosed,
}

impl DispatchError {
    /// True when the tool binary itself could not be started.
    pub fn is_spawn(&self) -> bool {
        matches!(self, DispatchError::Spawn { .. })
    }
}
