//! Load -> batch -> dispatch -> aggregate -> write.

use autoblast_protocol::{OutputFormat, Record};
use autoblast_worker::{DispatchError, Dispatcher, JobConfig};
use serde::Serialize;
use std::num::NonZeroUsize;
use std::path::{Component, Path, PathBuf};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{info, warn};

use crate::aggregator::{Aggregator, BatchFailure};
use crate::batcher::split_into_batches;
use crate::loader::{load_records, LoadError, LoaderOptions};
use crate::table::{write_retry_manifest, TableError};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error(transparent)]
    Table(#[from] TableError),

    #[error("Cannot resolve path {}: {source}", path.display())]
    Path {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Loader task failed: {0}")]
    Task(String),
}

/// Everything one run needs, already resolved from CLI, config file and defaults.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub input: PathBuf,
    /// `None` derives the artifact path from the input path.
    pub output: Option<PathBuf>,
    pub loader: LoaderOptions,
    /// `None` puts every record into one batch.
    pub batch_size: Option<NonZeroUsize>,
    pub binary: PathBuf,
    pub database: String,
    pub outfmt: OutputFormat,
    pub max_target_seqs: u32,
    pub timeout: Duration,
    pub max_concurrent: usize,
    pub local_db: Option<PathBuf>,
}

/// What a run did, printed for the operator.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub input: PathBuf,
    pub output: PathBuf,
    pub retry_manifest: Option<PathBuf>,
    pub total_rows: usize,
    pub records: usize,
    pub dropped_incomplete: usize,
    pub dropped_duplicates: usize,
    pub batches: usize,
    pub completed_batches: usize,
    pub rows_written: usize,
    pub skipped_lines: usize,
    pub filtered_lines: usize,
    pub timed_out: Vec<BatchFailure>,
    pub failed: Vec<BatchFailure>,
    pub elapsed_secs: f64,
}

impl RunSummary {
    /// True when at least one batch produced no rows because its job did not complete.
    pub fn is_partial(&self) -> bool {
        !self.timed_out.is_empty() || !self.failed.is_empty()
    }
}

/// `<input>.csv`, or `<stem>.results.csv` when the input is itself a CSV.
pub fn default_output_path(input: &Path) -> PathBuf {
    let is_csv = input
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("csv"));
    if is_csv {
        input.with_extension("results.csv")
    } else {
        input.with_extension("csv")
    }
}

/// `<stem>.retry.csv` in the artifact's directory.
pub fn default_retry_path(input: &Path, output: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "autoblast".to_string());
    let dir = output.parent().unwrap_or_else(|| Path::new(""));
    dir.join(format!("{}.retry.csv", stem))
}

fn absolute(path: &Path) -> Result<PathBuf, PipelineError> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .map_err(|source| PipelineError::Path {
            path: path.to_path_buf(),
            source,
        })
}

/// Resolve `path` for identity comparison.
///
/// Existing paths are canonicalized. For a file that does not exist yet, the
/// parent is canonicalized and the file name re-attached. When the parent does
/// not exist either, `.` and `..` are folded lexically first.
fn resolve_path(path: &Path) -> PathBuf {
    if let Ok(real) = path.canonicalize() {
        return real;
    }
    let with_parent = |p: &Path| match (p.parent(), p.file_name()) {
        (Some(parent), Some(name)) => {
            let parent = if parent.as_os_str().is_empty() {
                Path::new(".")
            } else {
                parent
            };
            parent.canonicalize().ok().map(|dir| dir.join(name))
        }
        _ => None,
    };
    if let Some(resolved) = with_parent(path) {
        return resolved;
    }

    let absolute = absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let mut folded = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                folded.pop();
            }
            other => folded.push(other),
        }
    }
    folded
        .canonicalize()
        .ok()
        .or_else(|| with_parent(&folded))
        .unwrap_or(folded)
}

/// True when `a` and `b` name the same file, whether or not it exists yet.
fn same_file(a: &Path, b: &Path) -> bool {
    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;
        if let (Ok(ma), Ok(mb)) = (std::fs::metadata(a), std::fs::metadata(b)) {
            return ma.dev() == mb.dev() && ma.ino() == mb.ino();
        }
    }
    resolve_path(a) == resolve_path(b)
}

pub async fn run_pipeline(config: RunConfig) -> Result<RunSummary, PipelineError> {
    let started = Instant::now();
    if config.outfmt.columns.is_empty() {
        return Err(PipelineError::Config(format!(
            "output format '{}' declares no columns",
            config.outfmt
        )));
    }

    let output = config
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(&config.input));
    if same_file(&output, &config.input) {
        return Err(PipelineError::Config(format!(
            "output path {} would overwrite the input",
            output.display()
        )));
    }
    let retry_path = default_retry_path(&config.input, &output);
    if same_file(&retry_path, &output) || same_file(&retry_path, &config.input) {
        return Err(PipelineError::Config(format!(
            "output path {} collides with the retry file {}",
            output.display(),
            retry_path.display()
        )));
    }
    let local_db = config.local_db.as_deref().map(absolute).transpose()?;

    let input = config.input.clone();
    let loader = config.loader.clone();
    let loaded = tokio::task::spawn_blocking(move || load_records(&input, &loader))
        .await
        .map_err(|e| PipelineError::Task(e.to_string()))??;

    let batches = split_into_batches(loaded.records, config.batch_size);
    let batch_records: Vec<Vec<Record>> = batches.iter().map(|b| b.records.clone()).collect();
    let total_batches = batches.len();
    let record_count: usize = batch_records.iter().map(Vec::len).sum();
    info!(
        "Split {} records into {} batches",
        record_count, total_batches
    );

    let dispatcher = Dispatcher::new(
        JobConfig {
            binary: config.binary.clone(),
            database: config.database.clone(),
            outfmt: config.outfmt.as_str().to_string(),
            max_target_seqs: config.max_target_seqs,
            timeout: config.timeout,
            local_db,
        },
        config.max_concurrent,
    );

    let mut aggregator = Aggregator::new(config.outfmt.clone());
    let mut finished = 0usize;
    dispatcher
        .run_with(batches, |report| {
            finished += 1;
            info!(
                "[Batch {}] {} after {:.1}s ({}/{})",
                report.batch_index,
                report.outcome.as_str(),
                report.elapsed.as_secs_f64(),
                finished,
                total_batches
            );
            aggregator.add(report);
        })
        .await?;
    let aggregated = aggregator.finish();

    aggregated.table.write_csv(&output)?;
    info!(
        "Wrote {} rows to {}",
        aggregated.table.len(),
        output.display()
    );

    let unfinished = aggregated.unfinished_batches();
    let retry_manifest = if unfinished.is_empty() {
        None
    } else {
        let retry: Vec<Record> = unfinished
            .iter()
            .filter_map(|&i| batch_records.get(i))
            .flatten()
            .cloned()
            .collect();
        write_retry_manifest(&retry_path, &retry)?;
        warn!(
            "{} batches did not complete; {} records written to {}",
            unfinished.len(),
            retry.len(),
            retry_path.display()
        );
        Some(retry_path)
    };

    Ok(RunSummary {
        input: config.input,
        output,
        retry_manifest,
        total_rows: loaded.total_rows,
        records: record_count,
        dropped_incomplete: loaded.dropped_incomplete,
        dropped_duplicates: loaded.dropped_duplicates,
        batches: total_batches,
        completed_batches: total_batches - unfinished.len(),
        rows_written: aggregated.table.len(),
        skipped_lines: aggregated.skipped_lines,
        filtered_lines: aggregated.filtered_lines,
        timed_out: aggregated.timed_out,
        failed: aggregated.failed,
        elapsed_secs: started.elapsed().as_secs_f64(),
    })
}
