//! Output-format mini-language.
//!
//! `[<code>] [delim=<char>] <space-separated column names>`, consumed in that
//! order. The raw string is passed to the alignment tool untouched; the parsed
//! form tells the aggregator how to split each output line.

use regex::Regex;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use thiserror::Error;

const OUTFMT_PATTERN: &str = r"^(\d+)?\s?(delim=.)?\s?(.*)$";
const DEFAULT_DELIMITER: char = ' ';

#[derive(Debug, Error, PartialEq, Eq)]
pub enum OutputFormatError {
    #[error("output format does not match `[<code>] [delim=<char>] <columns...>`: {0:?}")]
    Malformed(String),

    #[error("output format code is out of range: {0}")]
    InvalidCode(String),
}

/// A parsed output-format declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFormat {
    raw: String,
    pub code: Option<u32>,
    pub delimiter: char,
    pub columns: Vec<String>,
}

fn outfmt_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(OUTFMT_PATTERN).expect("output format pattern is valid"))
}

impl OutputFormat {
    /// Parse a declaration. One trailing newline is ignored, so values read
    /// from multi-line config strings are accepted.
    pub fn parse(raw: &str) -> Result<Self, OutputFormatError> {
        let raw = raw.strip_suffix('\n').unwrap_or(raw);
        let caps = outfmt_regex()
            .captures(raw)
            .ok_or_else(|| OutputFormatError::Malformed(raw.to_string()))?;

        let code = caps
            .get(1)
            .map(|m| {
                m.as_str()
                    .parse::<u32>()
                    .map_err(|_| OutputFormatError::InvalidCode(m.as_str().to_string()))
            })
            .transpose()?;

        // "delim=" is six bytes; the capture is always followed by exactly one char.
        let delimiter = caps
            .get(2)
            .and_then(|m| m.as_str()["delim=".len()..].chars().next())
            .unwrap_or(DEFAULT_DELIMITER);

        let columns = caps
            .get(3)
            .map(|m| m.as_str().split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();

        Ok(Self {
            raw: raw.to_string(),
            code,
            delimiter,
            columns,
        })
    }

    /// The declaration as given, for the subprocess command line.
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl FromStr for OutputFormat {
    type Err = OutputFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
