//! Result table and the files written at the end of a run.

use autoblast_protocol::Record;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TableError {
    #[error("Failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// One parsed output line, its fields in declared column order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultRow {
    pub batch_index: usize,
    pub fields: Vec<String>,
}

/// Concatenation of every job's rows, in job completion order.
#[derive(Debug, Clone, Default)]
pub struct ResultTable {
    columns: Vec<String>,
    rows: Vec<ResultRow>,
}

impl ResultTable {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[ResultRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn extend(&mut self, rows: impl IntoIterator<Item = ResultRow>) {
        self.rows.extend(rows);
    }

    /// Write the table as comma-separated text with a header row.
    pub fn write_csv(&self, path: &Path) -> Result<(), TableError> {
        let write_err = |source: csv::Error| TableError::Write {
            path: path.to_path_buf(),
            source,
        };
        let mut writer = csv::Writer::from_path(path).map_err(write_err)?;
        writer.write_record(&self.columns).map_err(write_err)?;
        for row in &self.rows {
            writer.write_record(&row.fields).map_err(write_err)?;
        }
        writer.flush().map_err(|source| TableError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Write records as an `id,sequence` CSV that the loader accepts as input.
pub fn write_retry_manifest(path: &Path, records: &[Record]) -> Result<(), TableError> {
    let write_err = |source: csv::Error| TableError::Write {
        path: path.to_path_buf(),
        source,
    };
    let mut writer = csv::Writer::from_path(path).map_err(write_err)?;
    writer.write_record(["id", "sequence"]).map_err(write_err)?;
    for record in records {
        writer
            .write_record([record.id.as_str(), record.sequence.as_str()])
            .map_err(write_err)?;
    }
    writer.flush().map_err(|source| TableError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn row(batch_index: usize, fields: &[&str]) -> ResultRow {
        ResultRow {
            batch_index,
            fields: fields.iter().map(|f| f.to_string()).collect(),
        }
    }

    #[test]
    fn test_write_csv_with_header() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("out.csv");
        let mut table = ResultTable::new(vec!["qseqid".into(), "sscinames".into()]);
        table.extend(vec![
            row(1, &["seq4", "Homo sapiens"]),
            row(0, &["seq0", "Danio rerio, zebrafish"]),
        ]);
        table.write_csv(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            text,
            "qseqid,sscinames\nseq4,Homo sapiens\nseq0,\"Danio rerio, zebrafish\"\n"
        );
    }

    #[test]
    fn test_empty_table_still_has_header() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("empty.csv");
        ResultTable::new(vec!["a".into(), "b".into()])
            .write_csv(&path)
            .unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "a,b\n");
    }

    #[test]
    fn test_retry_manifest() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("retry.csv");
        write_retry_manifest(
            &path,
            &[Record::new("seq3", "ACGT"), Record::new("seq9", "TTGA")],
        )
        .unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "id,sequence\nseq3,ACGT\nseq9,TTGA\n"
        );
    }

    #[test]
    fn test_write_to_missing_dir_fails() {
        let table = ResultTable::new(vec!["a".into()]);
        let err = table
            .write_csv(Path::new("/nonexistent/dir/out.csv"))
            .unwrap_err();
        assert!(matches!(err, TableError::Write { .. }));
    }
}
