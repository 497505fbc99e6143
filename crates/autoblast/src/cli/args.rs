//! Command-line arguments.
//!
//! Every tunable is optional here so that a value can come from the flag, its
//! environment variable, the config file, or the built-in default, in that
//! order. Resolution happens in [`super::config::resolve`].

use autoblast_protocol::defaults::DEFAULT_SEQUENCE_COLUMN;
use clap::Parser;
use std::num::NonZeroUsize;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "autoblast",
    version,
    about = "Run spreadsheet sequences through blastn in parallel batches",
    long_about = "Reads sequences from a spreadsheet, submits them to a blastn-style \
                  tool in batches (several at a time, each with a timeout) and collects \
                  the tabular output into a single CSV."
)]
pub struct Cli {
    /// Input spreadsheet (.xlsx, .xlsm, .xlsb, .xls, .ods, .csv or .tsv)
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Maximum number of sequences per batch (default: all in one batch)
    #[arg(long = "max-seqs-per-file", visible_alias = "nseqs", value_name = "N")]
    pub max_seqs_per_file: Option<NonZeroUsize>,

    /// Alignment tool binary
    #[arg(long, env = "AUTOBLAST_BIN")]
    pub bin: Option<PathBuf>,

    /// Remote database name
    #[arg(long, env = "AUTOBLAST_DB")]
    pub db: Option<String>,

    /// Local taxonomy database directory, exported to the tool as BLASTDB
    #[arg(long, env = "AUTOBLAST_TAXDB", value_name = "DIR")]
    pub taxdb: Option<PathBuf>,

    /// Maximum number of hits reported per query
    #[arg(long, alias = "max_target_seqs", value_name = "N")]
    pub max_target_seqs: Option<u32>,

    /// Output format: `[<code>] [delim=<char>] <columns...>`
    #[arg(long, value_name = "FORMAT")]
    pub outfmt: Option<String>,

    /// Per-batch timeout in seconds
    #[arg(long, env = "AUTOBLAST_TIMEOUT", value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Number of batches run concurrently
    #[arg(short = 'j', long, env = "AUTOBLAST_JOBS", value_name = "N")]
    pub jobs: Option<usize>,

    /// Name of the column holding the sequences
    #[arg(long, default_value = DEFAULT_SEQUENCE_COLUMN, value_name = "NAME")]
    pub sequence_column: String,

    /// Name of a column holding record ids (default: seq<row>)
    #[arg(long, value_name = "NAME")]
    pub id_column: Option<String>,

    /// Result CSV path (default: next to the input)
    #[arg(short = 'o', long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Config file (default: ~/.autoblast/config.toml when present)
    #[arg(long, env = "AUTOBLAST_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Print the run summary (or error) as JSON
    #[arg(long)]
    pub json: bool,

    /// Enable debug logging on stderr
    #[arg(short = 'v', long)]
    pub verbose: bool,
}
