//! Job execution: one batch, one subprocess.
//!
//! Per job:
//! 1. Write the batch to a temporary query file (deleted on drop, on every path)
//! 2. Spawn the alignment tool in its own process group
//! 3. Wait for exit or timeout; on timeout kill the whole group
//! 4. Strip warning lines from stdout and hand the rest back as raw text

use autoblast_protocol::defaults::BLASTDB_ENV;
use autoblast_protocol::{Batch, JobOutcome, JobReport};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tempfile::NamedTempFile;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::process::ProcessGroupGuard;
use crate::DispatchError;

/// Maximum stderr kept on a failed job report.
const MAX_STDERR_CHARS: usize = 500;

/// Invocation parameters shared by every job of a run (plain data, no behavior).
#[derive(Debug, Clone)]
pub struct JobConfig {
    /// Alignment binary, either a path or a name resolved through PATH.
    pub binary: PathBuf,
    /// Remote database name passed as `-db`.
    pub database: String,
    /// Output-format declaration passed verbatim as `-outfmt`.
    pub outfmt: String,
    /// Passed as `-max_target_seqs`.
    pub max_target_seqs: u32,
    /// Wall-clock budget for one subprocess.
    pub timeout: Duration,
    /// Local database directory, exported to the child as `BLASTDB`.
    pub local_db: Option<PathBuf>,
}

/// Build the command line for one query file.
///
/// `<binary> -remote -db <name> -query <file> -max_target_seqs <N> -outfmt <fmt>`
pub fn build_command(config: &JobConfig, query_path: &Path) -> Command {
    let mut cmd = Command::new(&config.binary);
    cmd.arg("-remote")
        .arg("-db")
        .arg(&config.database)
        .arg("-query")
        .arg(query_path)
        .arg("-max_target_seqs")
        .arg(config.max_target_seqs.to_string())
        .arg("-outfmt")
        .arg(&config.outfmt);

    if let Some(local_db) = &config.local_db {
        cmd.env(BLASTDB_ENV, local_db);
    }

    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    #[cfg(unix)]
    cmd.process_group(0);

    cmd
}

/// Write the batch to a fresh temporary file in the query format.
fn write_query_file(batch: &Batch) -> std::io::Result<NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .prefix(&format!("autoblast-batch{}-", batch.index))
        .suffix(".fasta")
        .tempfile()?;
    file.write_all(batch.to_fasta().as_bytes())?;
    file.flush()?;
    Ok(file)
}

/// Drop every line containing "warning" (any case).
///
/// Returns the remaining text and the number of lines removed.
pub fn filter_warnings(raw: &str) -> (String, usize) {
    let mut kept = Vec::new();
    let mut removed = 0;
    for line in raw.lines() {
        if line.to_lowercase().contains("warning") {
            removed += 1;
        } else {
            kept.push(line);
        }
    }
    (kept.join("\n"), removed)
}

fn truncate_stderr(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.chars().count() > MAX_STDERR_CHARS {
        let head: String = trimmed.chars().take(MAX_STDERR_CHARS).collect();
        format!("{}... (truncated)", head)
    } else {
        trimmed.to_string()
    }
}

/// Run one batch to completion, failure, or timeout.
///
/// Only errors that make the whole run meaningless are returned as `Err`
/// (the query file cannot be written, the binary cannot be started, the
/// child cannot be waited on). Timeouts and non-zero exits are reported in
/// the returned [`JobReport`].
pub async fn run_job(batch: Batch, config: &JobConfig) -> Result<JobReport, DispatchError> {
    let batch_index = batch.index;
    let record_count = batch.len();
    let start = Instant::now();

    let query_file = write_query_file(&batch).map_err(|source| DispatchError::QueryFile {
        batch_index,
        source,
    })?;
    debug!(
        "[Batch {}] Wrote {} records to {}",
        batch_index,
        record_count,
        query_file.path().display()
    );

    let mut cmd = build_command(config, query_file.path());
    let child = cmd.spawn().map_err(|source| DispatchError::Spawn {
        binary: config.binary.clone(),
        source,
    })?;
    let mut guard = ProcessGroupGuard::new(child);
    info!(
        "[Batch {}] Spawned {} (pid={:?}) for {} records",
        batch_index,
        config.binary.display(),
        guard.pid(),
        record_count
    );

    let (mut stdout_pipe, mut stderr_pipe) = guard.take_pipes().ok_or_else(|| DispatchError::Io {
        batch_index,
        source: std::io::Error::new(std::io::ErrorKind::Other, "child pipes unavailable"),
    })?;

    let waited = tokio::time::timeout(config.timeout, async {
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let (out, err) = tokio::join!(
            stdout_pipe.read_to_end(&mut stdout),
            stderr_pipe.read_to_end(&mut stderr)
        );
        out?;
        err?;
        let status = guard.wait().await?;
        Ok::<(ExitStatus, Vec<u8>, Vec<u8>), std::io::Error>((status, stdout, stderr))
    })
    .await;

    let outcome = match waited {
        Err(_elapsed) => {
            warn!(
                "[Batch {}] TIMEOUT after {:.1}s, killing process group",
                batch_index,
                config.timeout.as_secs_f64()
            );
            guard.terminate().await;
            JobOutcome::TimedOut {
                timeout: config.timeout,
            }
        }
        Ok(Err(source)) => {
            guard.terminate().await;
            return Err(DispatchError::Io {
                batch_index,
                source,
            });
        }
        Ok(Ok((status, stdout, stderr))) => {
            let stderr = String::from_utf8_lossy(&stderr);
            if status.success() {
                if !stderr.trim().is_empty() {
                    warn!(
                        "[Batch {}] Tool stderr (process succeeded but had output):\n{}",
                        batch_index,
                        stderr.trim()
                    );
                }
                let raw = String::from_utf8_lossy(&stdout);
                let (filtered, filtered_lines) = filter_warnings(&raw);
                if filtered_lines > 0 {
                    debug!(
                        "[Batch {}] Dropped {} warning lines from output",
                        batch_index, filtered_lines
                    );
                }
                JobOutcome::Completed {
                    stdout: filtered,
                    filtered_lines,
                }
            } else {
                warn!(
                    "[Batch {}] Tool exited with {}: {}",
                    batch_index,
                    status,
                    if stderr.trim().is_empty() {
                        "(no stderr output)"
                    } else {
                        stderr.trim()
                    }
                );
                JobOutcome::Failed {
                    status: status.to_string(),
                    stderr: truncate_stderr(&stderr),
                }
            }
        }
    };

    // Query file is removed here, after the subprocess is gone.
    drop(query_file);

    let elapsed = start.elapsed();
    info!(
        "[Batch {}] Finished as {} in {:.2}s",
        batch_index,
        outcome.as_str(),
        elapsed.as_secs_f64()
    );

    Ok(JobReport {
        batch_index,
        record_count,
        elapsed,
        outcome,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use autoblast_protocol::Record;

    fn test_config() -> JobConfig {
        JobConfig {
            binary: PathBuf::from("blastn"),
            database: "nt".to_string(),
            outfmt: "6 delim=, qseqid sseqid".to_string(),
            max_target_seqs: 5,
            timeout: Duration::from_secs(10),
            local_db: None,
        }
    }

    #[test]
    fn test_filter_warnings_any_case() {
        let raw = "a,b\nWarning: foo\nc,d\nsome WARNING here\nwarning\ne,f";
        let (kept, removed) = filter_warnings(raw);
        assert_eq!(kept, "a,b\nc,d\ne,f");
        assert_eq!(removed, 3);
    }

    #[test]
    fn test_filter_warnings_no_matches() {
        let (kept, removed) = filter_warnings("x y\nz w\n");
        assert_eq!(kept, "x y\nz w");
        assert_eq!(removed, 0);
    }

    #[test]
    fn test_build_command_args() {
        let config = test_config();
        let cmd = build_command(&config, Path::new("/tmp/query.fasta"));
        let std_cmd = cmd.as_std();
        assert_eq!(std_cmd.get_program(), "blastn");
        let args: Vec<_> = std_cmd
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            vec![
                "-remote",
                "-db",
                "nt",
                "-query",
                "/tmp/query.fasta",
                "-max_target_seqs",
                "5",
                "-outfmt",
                "6 delim=, qseqid sseqid",
            ]
        );
        assert!(std_cmd.get_envs().next().is_none());
    }

    #[test]
    fn test_build_command_sets_local_db_env() {
        let mut config = test_config();
        config.local_db = Some(PathBuf::from("/data/taxdb"));
        let cmd = build_command(&config, Path::new("q.fasta"));
        let envs: Vec<_> = cmd
            .as_std()
            .get_envs()
            .map(|(k, v)| (k.to_owned(), v.map(|v| v.to_owned())))
            .collect();
        assert_eq!(envs.len(), 1);
        assert_eq!(envs[0].0, BLASTDB_ENV);
        assert_eq!(envs[0].1.as_deref(), Some(std::ffi::OsStr::new("/data/taxdb")));
    }

    #[test]
    fn test_write_query_file() {
        let batch = Batch::new(2, vec![Record::new("seq0", "ACGT")]);
        let file = write_query_file(&batch).unwrap();
        let content = std::fs::read_to_string(file.path()).unwrap();
        assert_eq!(content, ">seq0\nACGT\n");
        let path = file.path().to_path_buf();
        drop(file);
        assert!(!path.exists());
    }

    #[test]
    fn test_truncate_stderr() {
        assert_eq!(truncate_stderr("  oops \n"), "oops");
        let long = "x".repeat(1000);
        let truncated = truncate_stderr(&long);
        assert!(truncated.ends_with("... (truncated)"));
        assert!(truncated.len() < 600);
    }
}
