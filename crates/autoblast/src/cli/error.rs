//! Helpful error types for the CLI
//!
//! Every error includes:
//! - What went wrong
//! - Context about the situation
//! - Suggestions for how to fix it

use autoblast::loader::LoadError;
use autoblast::PipelineError;
use autoblast_worker::DispatchError;
use serde::Serialize;
use std::fmt;
use std::path::Path;

use super::config::ConfigError;

/// An error with helpful context and suggestions
#[derive(Debug, Serialize)]
pub struct HelpfulError {
    /// The main error message
    pub message: String,
    /// Additional context about what was happening
    pub context: Option<String>,
    /// Suggestions for how to fix the error
    pub suggestions: Vec<String>,
}

impl HelpfulError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            context: None,
            suggestions: Vec::new(),
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    pub fn with_suggestions(
        mut self,
        suggestions: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.suggestions
            .extend(suggestions.into_iter().map(|s| s.into()));
        self
    }

    // === Common error constructors ===

    /// Input file does not exist
    pub fn file_not_found(path: &Path) -> Self {
        Self::new(format!("File not found: {}", path.display()))
            .with_context("The input spreadsheet does not exist")
            .with_suggestions([
                format!("TRY: Check if the file exists: ls -la {}", path.display()),
                format!(
                    "TRY: Look for similar files: ls {}",
                    parent_display(path)
                ),
            ])
    }

    /// Input extension is not one we can read
    pub fn unsupported_input(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("(no extension)");
        Self::new(format!("Unsupported input type: {}", ext))
            .with_context(format!("Cannot read sequences from {}", path.display()))
            .with_suggestion("TRY: Supported types: xlsx, xlsm, xlsb, xls, ods, csv, tsv")
    }

    /// Sequence or id column missing from the header row
    pub fn missing_column(path: &Path, column: &str, available: &[String]) -> Self {
        let mut err = Self::new(format!("Column '{}' not found", column)).with_context(format!(
            "Header of {}: {}",
            path.display(),
            available.join(", ")
        ));
        if let Some(close) = available
            .iter()
            .find(|c| c.to_lowercase().contains(&column.to_lowercase()))
        {
            err = err.with_suggestion(format!("TRY: --sequence-column '{}'", close));
        }
        err.with_suggestions([
            "TRY: Rename the column holding the sequences to 'sequence'".to_string(),
            "TRY: Pass the column name with --sequence-column (or --id-column)".to_string(),
        ])
    }

    /// The alignment tool could not be started
    pub fn tool_not_startable(binary: &Path, reason: &str) -> Self {
        Self::new(format!("Cannot run alignment tool: {}", binary.display()))
            .with_context(reason.to_string())
            .with_suggestions([
                format!("TRY: Check the tool is installed: which {}", binary.display()),
                "TRY: Point at the binary with --bin or AUTOBLAST_BIN".to_string(),
                "TRY: Make sure the file is executable: chmod +x <path>".to_string(),
            ])
    }

    /// Invalid flag, environment value or config file
    pub fn invalid_config(details: &str) -> Self {
        Self::new(format!("Invalid configuration: {}", details)).with_suggestions([
            "TRY: Run autoblast --help for the accepted values".to_string(),
            format!(
                "TRY: Check the config file: {}",
                autoblast_protocol::paths::default_config_path().display()
            ),
        ])
    }

    /// Run interrupted by the operator
    pub fn interrupted() -> Self {
        Self::new("Interrupted")
            .with_context("All running alignment jobs were stopped; no result file was written")
    }
}

fn parent_display(path: &Path) -> String {
    path.parent()
        .map(|p| p.display().to_string())
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| ".".to_string())
}

impl From<ConfigError> for HelpfulError {
    fn from(err: ConfigError) -> Self {
        match &err {
            ConfigError::Parse { path, .. } | ConfigError::Read { path, .. } => {
                Self::new(err.to_string()).with_suggestions([
                    format!("TRY: Check the file: cat {}", path.display()),
                    "TRY: Accepted keys: bin, db, taxdb, max_target_seqs, outfmt, \
                     timeout_secs, max_concurrent_jobs, max_seqs_per_file"
                        .to_string(),
                ])
            }
            ConfigError::OutputFormat(_) | ConfigError::Invalid(_) => {
                Self::invalid_config(&err.to_string())
            }
        }
    }
}

impl From<PipelineError> for HelpfulError {
    fn from(err: PipelineError) -> Self {
        match &err {
            PipelineError::Load(LoadError::Io { path, source })
                if source.kind() == std::io::ErrorKind::NotFound =>
            {
                Self::file_not_found(path)
            }
            PipelineError::Load(LoadError::UnsupportedFormat { path }) => {
                Self::unsupported_input(path)
            }
            PipelineError::Load(LoadError::MissingColumn {
                path,
                column,
                available,
            }) => Self::missing_column(path, column, available),
            PipelineError::Load(LoadError::DuplicateId { .. }) => Self::new(err.to_string())
                .with_suggestion("TRY: Ids must be unique; pick another --id-column or omit it"),
            PipelineError::Load(_) => Self::new(err.to_string())
                .with_context("Failed to read the input file")
                .with_suggestion("TRY: Open the file in a spreadsheet program and re-save it"),
            PipelineError::Dispatch(DispatchError::Spawn { binary, source }) => {
                Self::tool_not_startable(binary, &source.to_string())
            }
            PipelineError::Config(details) => Self::invalid_config(details),
            PipelineError::Table(_) => Self::new(err.to_string())
                .with_suggestion("TRY: Choose a writable location with --output"),
            PipelineError::Dispatch(_) | PipelineError::Path { .. } | PipelineError::Task(_) => {
                Self::new(err.to_string())
            }
        }
    }
}

impl fmt::Display for HelpfulError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ERROR: {}", self.message)?;

        if let Some(ctx) = &self.context {
            writeln!(f, "CONTEXT: {}", ctx)?;
        }

        if !self.suggestions.is_empty() {
            writeln!(f)?;
            for suggestion in &self.suggestions {
                writeln!(f, "  {}", suggestion)?;
            }
        }

        Ok(())
    }
}

impl std::error::Error for HelpfulError {}

/// Print an error as `{"error": {...}}` on stdout for `--json` callers.
pub fn print_json_error(err: &anyhow::Error) {
    let payload = match err.downcast_ref::<HelpfulError>() {
        Some(helpful) => serde_json::json!({ "error": helpful }),
        None => serde_json::json!({
            "error": {
                "message": format!("{:#}", err),
                "context": null,
                "suggestions": [],
            }
        }),
    };
    match serde_json::to_string_pretty(&payload) {
        Ok(text) => println!("{}", text),
        Err(_) => println!("{{\"error\":{{\"message\":{:?}}}}}", err.to_string()),
    }
}
