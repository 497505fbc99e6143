//! Config file and final run configuration.
//!
//! `~/.autoblast/config.toml` (or `--config`) may set any of the tool
//! options. Flags and their environment variables win over the file, and the
//! file wins over the built-in defaults.

use autoblast::loader::LoaderOptions;
use autoblast::RunConfig;
use autoblast_protocol::defaults::{
    DEFAULT_BIN, DEFAULT_DB, DEFAULT_MAX_CONCURRENT_JOBS, DEFAULT_MAX_TARGET_SEQS, DEFAULT_OUTFMT,
    DEFAULT_TIMEOUT_SECS,
};
use autoblast_protocol::paths::default_config_path;
use autoblast_protocol::{OutputFormat, OutputFormatError};
use serde::Deserialize;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use super::args::Cli;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid output format: {0}")]
    OutputFormat(#[from] OutputFormatError),

    #[error("{0}")]
    Invalid(String),
}

/// Contents of `config.toml`. Every key is optional; unknown keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub bin: Option<PathBuf>,
    pub db: Option<String>,
    pub taxdb: Option<PathBuf>,
    pub max_target_seqs: Option<u32>,
    pub outfmt: Option<String>,
    pub timeout_secs: Option<u64>,
    pub max_concurrent_jobs: Option<usize>,
    pub max_seqs_per_file: Option<NonZeroUsize>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load an explicitly named file (which must exist), or the default file if present.
    pub fn discover(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        match explicit {
            Some(path) => Self::load(path),
            None => {
                let path = default_config_path();
                if path.is_file() {
                    Self::load(&path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }
}

/// Merge flags, config file and defaults into a validated [`RunConfig`].
pub fn resolve(cli: &Cli, file: FileConfig) -> Result<RunConfig, ConfigError> {
    let outfmt_raw = cli
        .outfmt
        .clone()
        .or(file.outfmt)
        .unwrap_or_else(|| DEFAULT_OUTFMT.to_string());
    let outfmt = OutputFormat::parse(&outfmt_raw)?;
    if outfmt.columns.is_empty() {
        return Err(ConfigError::Invalid(format!(
            "output format '{}' declares no columns",
            outfmt_raw
        )));
    }

    let timeout_secs = cli
        .timeout
        .or(file.timeout_secs)
        .unwrap_or(DEFAULT_TIMEOUT_SECS);
    if timeout_secs == 0 {
        return Err(ConfigError::Invalid(
            "timeout must be at least 1 second".to_string(),
        ));
    }

    let max_concurrent = cli
        .jobs
        .or(file.max_concurrent_jobs)
        .unwrap_or(DEFAULT_MAX_CONCURRENT_JOBS);
    if max_concurrent == 0 {
        return Err(ConfigError::Invalid(
            "number of concurrent jobs must be at least 1".to_string(),
        ));
    }

    let max_target_seqs = cli
        .max_target_seqs
        .or(file.max_target_seqs)
        .unwrap_or(DEFAULT_MAX_TARGET_SEQS);
    if max_target_seqs == 0 {
        return Err(ConfigError::Invalid(
            "max_target_seqs must be at least 1".to_string(),
        ));
    }

    Ok(RunConfig {
        input: cli.file.clone(),
        output: cli.output.clone(),
        loader: LoaderOptions {
            sequence_column: cli.sequence_column.clone(),
            id_column: cli.id_column.clone(),
        },
        batch_size: cli.max_seqs_per_file.or(file.max_seqs_per_file),
        binary: cli
            .bin
            .clone()
            .or(file.bin)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_BIN)),
        database: cli
            .db
            .clone()
            .or(file.db)
            .unwrap_or_else(|| DEFAULT_DB.to_string()),
        outfmt,
        max_target_seqs,
        timeout: Duration::from_secs(timeout_secs),
        max_concurrent,
        local_db: cli.taxdb.clone().or(file.taxdb),
    })
}
