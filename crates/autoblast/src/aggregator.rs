//! Turn job reports into a single result table.

use autoblast_protocol::{JobOutcome, JobReport, OutputFormat};
use serde::Serialize;
use tracing::{debug, warn};

use crate::table::{ResultRow, ResultTable};

/// Rows parsed from one job's output.
#[derive(Debug, Default)]
pub struct ParsedOutput {
    pub rows: Vec<Vec<String>>,
    /// Lines whose field count did not match the declared columns.
    pub skipped_lines: usize,
}

/// Split `text` into rows according to `format`.
///
/// Blank lines are ignored. A line with the wrong number of fields is skipped
/// and counted, never fatal.
pub fn parse_output(text: &str, format: &OutputFormat) -> ParsedOutput {
    let expected = format.columns.len();
    let mut parsed = ParsedOutput::default();

    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }
        let fields = split_line(line, format.delimiter);
        if fields.len() != expected {
            warn!(
                "Skipping output line {}: expected {} fields, found {}",
                line_no + 1,
                expected,
                fields.len()
            );
            parsed.skipped_lines += 1;
            continue;
        }
        parsed.rows.push(fields);
    }
    parsed
}

fn split_line(line: &str, delimiter: char) -> Vec<String> {
    if delimiter.is_ascii() {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(delimiter as u8)
            .from_reader(line.as_bytes());
        if let Some(Ok(record)) = reader.records().next() {
            return record.iter().map(str::to_string).collect();
        }
    }
    line.split(delimiter).map(str::to_string).collect()
}

/// What happened to one batch that produced no rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchFailure {
    pub batch_index: usize,
    pub record_count: usize,
    pub reason: String,
}

/// Accumulates job reports as they arrive.
#[derive(Debug)]
pub struct Aggregator {
    format: OutputFormat,
    table: ResultTable,
    timed_out: Vec<BatchFailure>,
    failed: Vec<BatchFailure>,
    skipped_lines: usize,
    filtered_lines: usize,
}

impl Aggregator {
    pub fn new(format: OutputFormat) -> Self {
        let table = ResultTable::new(format.columns.clone());
        Self {
            format,
            table,
            timed_out: Vec::new(),
            failed: Vec::new(),
            skipped_lines: 0,
            filtered_lines: 0,
        }
    }

    pub fn add(&mut self, report: &JobReport) {
        let failure = |reason: String| BatchFailure {
            batch_index: report.batch_index,
            record_count: report.record_count,
            reason,
        };
        match &report.outcome {
            JobOutcome::Completed {
                stdout,
                filtered_lines,
            } => {
                let parsed = parse_output(stdout, &self.format);
                debug!(
                    "[Batch {}] Parsed {} rows ({} skipped)",
                    report.batch_index,
                    parsed.rows.len(),
                    parsed.skipped_lines
                );
                self.skipped_lines += parsed.skipped_lines;
                self.filtered_lines += filtered_lines;
                self.table
                    .extend(parsed.rows.into_iter().map(|fields| ResultRow {
                        batch_index: report.batch_index,
                        fields,
                    }));
            }
            JobOutcome::TimedOut { timeout } => {
                self.timed_out
                    .push(failure(format!("timed out after {}s", timeout.as_secs())));
            }
            JobOutcome::Failed { status, stderr } => {
                let reason = if stderr.is_empty() {
                    status.clone()
                } else {
                    format!("{}: {}", status, stderr.trim())
                };
                self.failed.push(failure(reason));
            }
        }
    }

    pub fn finish(self) -> Aggregated {
        Aggregated {
            table: self.table,
            timed_out: self.timed_out,
            failed: self.failed,
            skipped_lines: self.skipped_lines,
            filtered_lines: self.filtered_lines,
        }
    }
}

/// Final state of an aggregation.
#[derive(Debug)]
pub struct Aggregated {
    pub table: ResultTable,
    pub timed_out: Vec<BatchFailure>,
    pub failed: Vec<BatchFailure>,
    pub skipped_lines: usize,
    pub filtered_lines: usize,
}

impl Aggregated {
    /// Indices of every batch that contributed no rows because its job did not complete.
    pub fn unfinished_batches(&self) -> Vec<usize> {
        let mut indices: Vec<usize> = self
            .timed_out
            .iter()
            .chain(self.failed.iter())
            .map(|f| f.batch_index)
            .collect();
        indices.sort_unstable();
        indices
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn format(raw: &str) -> OutputFormat {
        OutputFormat::parse(raw).unwrap()
    }

    fn report(batch_index: usize, outcome: JobOutcome) -> JobReport {
        JobReport {
            batch_index,
            record_count: 2,
            elapsed: Duration::from_millis(10),
            outcome,
        }
    }

    fn completed(stdout: &str) -> JobOutcome {
        JobOutcome::Completed {
            stdout: stdout.to_string(),
            filtered_lines: 0,
        }
    }

    #[test]
    fn test_parse_comma_delimited() {
        let parsed = parse_output(
            "seq0,gi|1,1e-50\nseq1,gi|2,2e-10\n",
            &format("6 delim=, qseqid sseqid evalue"),
        );
        assert_eq!(parsed.skipped_lines, 0);
        assert_eq!(parsed.rows[1], vec!["seq1", "gi|2", "2e-10"]);
    }

    #[test]
    fn test_parse_quoted_field_with_delimiter() {
        let parsed = parse_output(
            "seq0,\"Danio rerio, zebrafish\"\n",
            &format("6 delim=, qseqid sscinames"),
        );
        assert_eq!(parsed.rows, vec![vec!["seq0", "Danio rerio, zebrafish"]]);
    }

    #[test]
    fn test_parse_default_space_delimiter() {
        let parsed = parse_output("seq0 hit 0.1\n", &format("6 qseqid sseqid evalue"));
        assert_eq!(parsed.rows, vec![vec!["seq0", "hit", "0.1"]]);
    }

    #[test]
    fn test_parse_tab_delimiter() {
        let parsed = parse_output("seq0\thit\n", &format("6 delim=\t qseqid sseqid"));
        assert_eq!(parsed.rows, vec![vec!["seq0", "hit"]]);
    }

    #[test]
    fn test_parse_non_ascii_delimiter() {
        let parsed = parse_output("seq0¦hit\n", &format("delim=¦ qseqid sseqid"));
        assert_eq!(parsed.rows, vec![vec!["seq0", "hit"]]);
    }

    #[test]
    fn test_blank_and_crlf_lines() {
        let parsed = parse_output(
            "\nseq0,hit\r\n   \nseq1,hit2\r\n",
            &format("6 delim=, qseqid sseqid"),
        );
        assert_eq!(parsed.skipped_lines, 0);
        assert_eq!(parsed.rows.len(), 2);
        assert_eq!(parsed.rows[0], vec!["seq0", "hit"]);
    }

    #[test]
    fn test_field_count_mismatch_is_skipped() {
        let parsed = parse_output(
            "seq0,hit,0.1\nseq1,hit\nseq2,hit,0.2,extra\n",
            &format("6 delim=, qseqid sseqid evalue"),
        );
        assert_eq!(parsed.rows.len(), 1);
        assert_eq!(parsed.skipped_lines, 2);
    }

    #[test]
    fn test_aggregator_excludes_timed_out_and_failed() {
        let mut agg = Aggregator::new(format("6 delim=, qseqid sseqid"));
        agg.add(&report(2, completed("seq8,a\nseq9,b\n")));
        agg.add(&report(
            1,
            JobOutcome::TimedOut {
                timeout: Duration::from_secs(60),
            },
        ));
        agg.add(&report(
            0,
            JobOutcome::Failed {
                status: "exit status: 2".to_string(),
                stderr: "no database\n".to_string(),
            },
        ));
        agg.add(&report(3, completed("seq10,c\n")));

        let done = agg.finish();
        assert_eq!(done.table.len(), 3);
        let order: Vec<usize> = done.table.rows().iter().map(|r| r.batch_index).collect();
        assert_eq!(order, vec![2, 2, 3]);
        assert_eq!(done.timed_out.len(), 1);
        assert_eq!(done.timed_out[0].reason, "timed out after 60s");
        assert_eq!(done.failed[0].reason, "exit status: 2: no database");
        assert_eq!(done.unfinished_batches(), vec![0, 1]);
    }

    #[test]
    fn test_aggregator_counts_skipped_and_filtered() {
        let mut agg = Aggregator::new(format("6 delim=, qseqid sseqid"));
        agg.add(&report(
            0,
            JobOutcome::Completed {
                stdout: "seq0,a\nbroken\n".to_string(),
                filtered_lines: 3,
            },
        ));
        let done = agg.finish();
        assert_eq!(done.table.len(), 1);
        assert_eq!(done.skipped_lines, 1);
        assert_eq!(done.filtered_lines, 3);
        assert_eq!(done.table.columns(), ["qseqid", "sseqid"]);
    }
}
