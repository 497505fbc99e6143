//! Pipeline data model: records in, job reports out.

use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::time::Duration;

/// One input row: a unique identifier and a non-empty sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    pub sequence: String,
}

impl Record {
    pub fn new(id: impl Into<String>, sequence: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            sequence: sequence.into(),
        }
    }
}

/// An ordered group of records submitted as one subprocess invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    /// Zero-based position of this batch in submission order.
    pub index: usize,
    pub records: Vec<Record>,
}

impl Batch {
    pub fn new(index: usize, records: Vec<Record>) -> Self {
        Self { index, records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Render the batch in the two-line-per-record query format
    /// (`>id` followed by the sequence).
    pub fn to_fasta(&self) -> String {
        let mut out = String::with_capacity(
            self.records
                .iter()
                .map(|r| r.id.len() + r.sequence.len() + 3)
                .sum(),
        );
        for record in &self.records {
            // Writing to a String cannot fail.
            let _ = writeln!(out, ">{}", record.id);
            let _ = writeln!(out, "{}", record.sequence);
        }
        out
    }
}

/// How a single job ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// The subprocess exited successfully. `stdout` already has warning lines removed.
    Completed {
        stdout: String,
        filtered_lines: usize,
    },
    /// The subprocess exceeded its allotted time and was killed.
    TimedOut { timeout: Duration },
    /// The subprocess exited with a non-zero status.
    Failed { status: String, stderr: String },
}

impl JobOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, JobOutcome::Completed { .. })
    }

    pub fn is_timed_out(&self) -> bool {
        matches!(self, JobOutcome::TimedOut { .. })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobOutcome::Completed { .. } => "completed",
            JobOutcome::TimedOut { .. } => "timed_out",
            JobOutcome::Failed { .. } => "failed",
        }
    }
}

/// Result of one job, tagged with the batch it came from.
#[derive(Debug, Clone)]
pub struct JobReport {
    pub batch_index: usize,
    pub record_count: usize,
    pub elapsed: Duration,
    pub outcome: JobOutcome,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_to_fasta() {
        let batch = Batch::new(
            0,
            vec![Record::new("seq0", "ACGT"), Record::new("seq1", "TTGA")],
        );
        assert_eq!(batch.to_fasta(), ">seq0\nACGT\n>seq1\nTTGA\n");
    }

    #[test]
    fn test_empty_batch_fasta() {
        let batch = Batch::new(3, vec![]);
        assert!(batch.is_empty());
        assert_eq!(batch.to_fasta(), "");
    }

    #[test]
    fn test_outcome_labels() {
        let done = JobOutcome::Completed {
            stdout: String::new(),
            filtered_lines: 0,
        };
        let late = JobOutcome::TimedOut {
            timeout: Duration::from_secs(1),
        };
        assert!(done.is_completed());
        assert!(late.is_timed_out());
        assert_eq!(late.as_str(), "timed_out");
        assert_eq!(
            JobOutcome::Failed {
                status: "exit status: 1".into(),
                stderr: String::new()
            }
            .as_str(),
            "failed"
        );
    }

    #[test]
    fn test_record_roundtrip_json() {
        let record = Record::new("seq7", "ACGTACGT");
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(json, r#"{"id":"seq7","sequence":"ACGTACGT"}"#);
    }
}
