//! Spreadsheet loader: input rows -> unique, complete [`Record`]s.
//!
//! Spreadsheets (`.xlsx`, `.xlsm`, `.xlsb`, `.xls`, `.ods`) are read with
//! calamine from the first worksheet; `.csv`/`.tsv` with the csv crate. In
//! both cases the first row is the header. Rows without a sequence (or without an id, when an
//! id column is configured) are dropped, then rows whose sequence was already
//! seen are dropped. The first occurrence wins.

use autoblast_protocol::defaults::DEFAULT_SEQUENCE_COLUMN;
use autoblast_protocol::Record;
use calamine::{open_workbook_auto, Data, Reader};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Cannot read input file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot parse spreadsheet {}: {message}", path.display())]
    Spreadsheet { path: PathBuf, message: String },

    #[error("Cannot parse CSV {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Unsupported input format: {}", path.display())]
    UnsupportedFormat { path: PathBuf },

    #[error("Spreadsheet {} has no worksheets", path.display())]
    NoWorksheet { path: PathBuf },

    #[error("Column '{column}' not found in {} (available: {})", path.display(), available.join(", "))]
    MissingColumn {
        path: PathBuf,
        column: String,
        available: Vec<String>,
    },

    #[error("Duplicate record id '{id}' at data row {row}")]
    DuplicateId { id: String, row: usize },
}

/// Which columns hold the sequence and (optionally) the record id.
#[derive(Debug, Clone)]
pub struct LoaderOptions {
    pub sequence_column: String,
    /// Without an id column, ids are `seq<N>` from the zero-based data row.
    pub id_column: Option<String>,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            sequence_column: DEFAULT_SEQUENCE_COLUMN.to_string(),
            id_column: None,
        }
    }
}

/// Loaded records plus what was thrown away on the way.
#[derive(Debug, Clone, Default)]
pub struct LoadedRecords {
    pub records: Vec<Record>,
    pub total_rows: usize,
    pub dropped_incomplete: usize,
    pub dropped_duplicates: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InputFormat {
    Spreadsheet,
    Delimited(u8),
}

fn detect_format(path: &Path) -> Result<InputFormat, LoadError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => Ok(InputFormat::Spreadsheet),
        "csv" => Ok(InputFormat::Delimited(b',')),
        "tsv" => Ok(InputFormat::Delimited(b'\t')),
        _ => Err(LoadError::UnsupportedFormat {
            path: path.to_path_buf(),
        }),
    }
}

/// Load and clean the records of an input file.
pub fn load_records(path: &Path, options: &LoaderOptions) -> Result<LoadedRecords, LoadError> {
    let format = detect_format(path)?;
    std::fs::metadata(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let (header, rows) = match format {
        InputFormat::Spreadsheet => read_spreadsheet(path)?,
        InputFormat::Delimited(delimiter) => read_delimited(path, delimiter)?,
    };
    debug!(
        "Read {} data rows with columns [{}] from {}",
        rows.len(),
        header.join(", "),
        path.display()
    );

    let loaded = records_from_rows(path, &header, rows, options)?;
    info!(
        "Loaded {} records from {} ({} rows, {} incomplete, {} duplicate)",
        loaded.records.len(),
        path.display(),
        loaded.total_rows,
        loaded.dropped_incomplete,
        loaded.dropped_duplicates
    );
    Ok(loaded)
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        other => other.to_string(),
    }
}

fn read_spreadsheet(path: &Path) -> Result<(Vec<String>, Vec<Vec<String>>), LoadError> {
    let spreadsheet_err = |message: String| LoadError::Spreadsheet {
        path: path.to_path_buf(),
        message,
    };

    let mut workbook = open_workbook_auto(path).map_err(|e| spreadsheet_err(e.to_string()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| LoadError::NoWorksheet {
            path: path.to_path_buf(),
        })?
        .map_err(|e| spreadsheet_err(e.to_string()))?;

    let mut rows = range.rows();
    let header = match rows.next() {
        Some(cells) => cells.iter().map(cell_to_string).collect(),
        None => Vec::new(),
    };
    let data = rows
        .map(|cells| cells.iter().map(cell_to_string).collect())
        .collect();
    Ok((header, data))
}

fn read_delimited(
    path: &Path,
    delimiter: u8,
) -> Result<(Vec<String>, Vec<Vec<String>>), LoadError> {
    let file = std::fs::File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let csv_err = |source: csv::Error| LoadError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(file);

    let header: Vec<String> = reader
        .headers()
        .map_err(csv_err)?
        .iter()
        .map(str::to_string)
        .collect();

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result.map_err(csv_err)?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok((header, rows))
}

fn find_column(path: &Path, header: &[String], name: &str) -> Result<usize, LoadError> {
    let wanted = name.trim();
    header
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case(wanted))
        .ok_or_else(|| LoadError::MissingColumn {
            path: path.to_path_buf(),
            column: wanted.to_string(),
            available: header.iter().map(|h| h.trim().to_string()).collect(),
        })
}

/// Turn raw header + rows into cleaned records.
pub fn records_from_rows(
    path: &Path,
    header: &[String],
    rows: Vec<Vec<String>>,
    options: &LoaderOptions,
) -> Result<LoadedRecords, LoadError> {
    let sequence_idx = find_column(path, header, &options.sequence_column)?;
    let id_idx = options
        .id_column
        .as_deref()
        .map(|name| find_column(path, header, name))
        .transpose()?;

    let mut loaded = LoadedRecords {
        total_rows: rows.len(),
        ..LoadedRecords::default()
    };
    let mut seen_sequences: HashSet<String> = HashSet::new();
    let mut seen_ids: HashSet<String> = HashSet::new();

    for (row_idx, row) in rows.into_iter().enumerate() {
        let cell = |idx: usize| row.get(idx).map(|v| v.trim()).unwrap_or("");

        let sequence = cell(sequence_idx);
        let id = match id_idx {
            Some(idx) => cell(idx).to_string(),
            None => format!("seq{}", row_idx),
        };
        if sequence.is_empty() || id.is_empty() {
            loaded.dropped_incomplete += 1;
            continue;
        }
        if !seen_sequences.insert(sequence.to_string()) {
            loaded.dropped_duplicates += 1;
            continue;
        }
        if !seen_ids.insert(id.clone()) {
            return Err(LoadError::DuplicateId { id, row: row_idx });
        }
        loaded.records.push(Record::new(id, sequence));
    }

    Ok(loaded)
}
