//! Canonical default values shared by the CLI, config file and worker.

pub const DEFAULT_BIN: &str = "blastn";
pub const DEFAULT_DB: &str = "nt";
pub const DEFAULT_MAX_TARGET_SEQS: u32 = 1;
pub const DEFAULT_OUTFMT: &str =
    "6 delim=, qseqid sseqid evalue bitscore pident length sgi sacc staxids sscinames scomnames";
pub const DEFAULT_TIMEOUT_SECS: u64 = 3600;
pub const DEFAULT_MAX_CONCURRENT_JOBS: usize = 4;
pub const DEFAULT_SEQUENCE_COLUMN: &str = "sequence";

/// Environment variable the alignment tool reads its local database directory from.
pub const BLASTDB_ENV: &str = "BLASTDB";
