//! Dispatcher behavior against small shell scripts standing in for the
//! alignment tool.
#![cfg(unix)]

use anyhow::Result;
use autoblast_protocol::{Batch, JobOutcome, Record};
use autoblast_worker::{Dispatcher, JobConfig};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tempfile::TempDir;

/// Prints one `id,hit,evalue` line per query record, preceded by a warning line.
/// Sleeps far past any test timeout when the query contains a SLOW record.
const FAKE_TOOL: &str = r#"#!/bin/sh
query=""
while [ $# -gt 0 ]; do
  case "$1" in
    -query) query="$2"; shift 2 ;;
    *) shift ;;
  esac
done
if grep -q SLOW "$query"; then
  sleep 30 &
  echo $! > "$(dirname "$0")/sleeper.pid"
  wait
fi
echo "Warning: [blastn] remote search may be slow"
grep '^>' "$query" | sed 's/^>//' | while read id; do
  echo "$id,hit_$id,0.001"
done
"#;

const FAILING_TOOL: &str = r#"#!/bin/sh
echo "BLAST query/options error: database not found" >&2
exit 3
"#;

const ENV_TOOL: &str = r#"#!/bin/sh
echo "blastdb=$BLASTDB"
"#;

fn write_script(dir: &Path, name: &str, body: &str) -> Result<PathBuf> {
    let path = dir.join(name);
    std::fs::write(&path, body)?;
    let mut perms = std::fs::metadata(&path)?.permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms)?;
    Ok(path)
}

fn job_config(binary: PathBuf, timeout: Duration) -> JobConfig {
    JobConfig {
        binary,
        database: "nt".to_string(),
        outfmt: "6 delim=, qseqid sseqid evalue".to_string(),
        max_target_seqs: 1,
        timeout,
        local_db: None,
    }
}

fn batches(sizes: &[usize]) -> Vec<Batch> {
    let mut next = 0;
    sizes
        .iter()
        .enumerate()
        .map(|(index, &size)| {
            let records = (0..size)
                .map(|_| {
                    let record = Record::new(format!("seq{}", next), format!("ACGT{}", next));
                    next += 1;
                    record
                })
                .collect();
            Batch::new(index, records)
        })
        .collect()
}

fn completed_stdout(outcome: &JobOutcome) -> &str {
    match outcome {
        JobOutcome::Completed { stdout, .. } => stdout,
        other => panic!("expected completed job, got {:?}", other),
    }
}

#[tokio::test]
async fn test_all_batches_complete_and_warnings_are_filtered() -> Result<()> {
    let tmp = TempDir::new()?;
    let tool = write_script(tmp.path(), "fake_blast.sh", FAKE_TOOL)?;
    let dispatcher = Dispatcher::new(job_config(tool, Duration::from_secs(10)), 2);

    let reports = dispatcher.run(batches(&[4, 4, 2])).await?;
    assert_eq!(reports.len(), 3);

    let mut indices: Vec<usize> = reports.iter().map(|r| r.batch_index).collect();
    indices.sort_unstable();
    assert_eq!(indices, vec![0, 1, 2]);

    let mut total_lines = 0;
    for report in &reports {
        let stdout = completed_stdout(&report.outcome);
        assert!(!stdout.to_lowercase().contains("warning"));
        let lines = stdout.lines().filter(|l| !l.is_empty()).count();
        assert_eq!(lines, report.record_count);
        total_lines += lines;

        if let JobOutcome::Completed { filtered_lines, .. } = report.outcome {
            assert_eq!(filtered_lines, 1);
        }
    }
    assert_eq!(total_lines, 10);
    Ok(())
}

#[tokio::test]
async fn test_timed_out_batch_is_reported_and_siblings_finish() -> Result<()> {
    let tmp = TempDir::new()?;
    let tool = write_script(tmp.path(), "fake_blast.sh", FAKE_TOOL)?;
    let dispatcher = Dispatcher::new(job_config(tool, Duration::from_millis(750)), 3);

    let mut work = batches(&[2, 2, 2]);
    work[1].records.push(Record::new("slow", "SLOW"));

    let start = Instant::now();
    let reports = dispatcher.run(work).await?;
    assert!(start.elapsed() < Duration::from_secs(15));
    assert_eq!(reports.len(), 3);

    for report in &reports {
        if report.batch_index == 1 {
            assert!(report.outcome.is_timed_out(), "{:?}", report.outcome);
        } else {
            assert_eq!(completed_stdout(&report.outcome).lines().count(), 2);
        }
    }

    // The background sleeper was in the tool's process group and must be gone.
    let pid = std::fs::read_to_string(tmp.path().join("sleeper.pid"))?;
    let pid = pid.trim().to_string();
    let mut alive = true;
    for _ in 0..40 {
        let status = std::process::Command::new("kill")
            .args(["-0", &pid])
            .stderr(std::process::Stdio::null())
            .status()?;
        if !status.success() {
            alive = false;
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert!(!alive, "sleeper process {} survived the timeout", pid);
    Ok(())
}

#[tokio::test]
async fn test_nonzero_exit_is_failed_not_fatal() -> Result<()> {
    let tmp = TempDir::new()?;
    let tool = write_script(tmp.path(), "failing.sh", FAILING_TOOL)?;
    let dispatcher = Dispatcher::new(job_config(tool, Duration::from_secs(10)), 2);

    let reports = dispatcher.run(batches(&[1, 1])).await?;
    assert_eq!(reports.len(), 2);
    for report in reports {
        match report.outcome {
            JobOutcome::Failed { status, stderr } => {
                assert!(status.contains('3'), "{status}");
                assert!(stderr.contains("database not found"));
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }
    Ok(())
}

#[tokio::test]
async fn test_local_db_is_passed_as_env() -> Result<()> {
    let tmp = TempDir::new()?;
    let tool = write_script(tmp.path(), "env.sh", ENV_TOOL)?;
    let mut config = job_config(tool, Duration::from_secs(10));
    config.local_db = Some(tmp.path().join("taxdb"));
    let dispatcher = Dispatcher::new(config, 1);

    let reports = dispatcher.run(batches(&[1])).await?;
    let stdout = completed_stdout(&reports[0].outcome);
    assert_eq!(
        stdout,
        format!("blastdb={}", tmp.path().join("taxdb").display())
    );
    Ok(())
}

#[tokio::test]
async fn test_concurrency_never_exceeds_limit() -> Result<()> {
    let tmp = TempDir::new()?;
    let running = tmp.path().join("running");
    std::fs::create_dir(&running)?;
    let counts = tmp.path().join("counts");
    let body = format!(
        r#"#!/bin/sh
touch "{running}/$$"
ls "{running}" | wc -l >> "{counts}"
sleep 0.3
rm -f "{running}/$$"
"#,
        running = running.display(),
        counts = counts.display()
    );
    let tool = write_script(tmp.path(), "counting.sh", &body)?;
    let dispatcher = Dispatcher::new(job_config(tool, Duration::from_secs(10)), 2);

    let reports = dispatcher.run(batches(&[1, 1, 1, 1, 1, 1])).await?;
    assert_eq!(reports.len(), 6);
    assert!(reports.iter().all(|r| r.outcome.is_completed()));

    let observed: Vec<usize> = std::fs::read_to_string(&counts)?
        .lines()
        .filter_map(|l| l.trim().parse().ok())
        .collect();
    assert_eq!(observed.len(), 6);
    assert!(
        observed.iter().all(|&n| n <= 2),
        "observed more than 2 concurrent jobs: {:?}",
        observed
    );
    Ok(())
}

#[tokio::test]
async fn test_query_files_are_removed() -> Result<()> {
    let tmp = TempDir::new()?;
    let seen = tmp.path().join("queries");
    let body = format!(
        r#"#!/bin/sh
while [ $# -gt 0 ]; do
  case "$1" in
    -query) echo "$2" >> "{seen}"; shift 2 ;;
    *) shift ;;
  esac
done
"#,
        seen = seen.display()
    );
    let tool = write_script(tmp.path(), "record_query.sh", &body)?;
    let dispatcher = Dispatcher::new(job_config(tool, Duration::from_secs(10)), 2);

    dispatcher.run(batches(&[2, 2, 2])).await?;

    let paths: Vec<String> = std::fs::read_to_string(&seen)?
        .lines()
        .map(str::to_string)
        .collect();
    assert_eq!(paths.len(), 3);
    for path in paths {
        assert!(!Path::new(&path).exists(), "query file {} was not removed", path);
    }
    Ok(())
}
