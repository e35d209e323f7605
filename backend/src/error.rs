//! Error types for the benchmarking pipeline.
//!
//! - [`CsvError`] - Cell-level decoding errors inside one extract
//! - [`ExtractError`] - Loading a raw survey extract
//! - [`ConfigError`] - Configuration loading and validation
//! - [`OutputError`] - Output contract validation and table writing
//! - [`PipelineError`] - Top-level orchestration errors
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.
//!
//! Missing denominators and missing join matches are not errors: they surface
//! as `None` in the output rows.

use std::path::PathBuf;
use thiserror::Error;

use crate::models::Survey;

// =============================================================================
// Cell decoding errors
// =============================================================================

/// CSV decoding error with line/column context.
#[derive(Debug, Clone)]
pub struct CsvError {
    pub line: usize,
    pub column: Option<String>,
    pub value: Option<String>,
    pub message: String,
}

impl CsvError {
    pub fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            column: None,
            value: None,
            message: message.into(),
        }
    }

    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }
}

impl std::fmt::Display for CsvError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.column, &self.value) {
            (Some(col), Some(val)) => {
                write!(
                    f,
                    "Line {}, column '{}' (value '{}'): {}",
                    self.line, col, val, self.message
                )
            }
            (Some(col), None) => {
                write!(f, "Line {}, column '{}': {}", self.line, col, self.message)
            }
            _ => write!(f, "Line {}: {}", self.line, self.message),
        }
    }
}

impl std::error::Error for CsvError {}

// =============================================================================
// Extract errors
// =============================================================================

/// Errors while loading a raw survey extract. All of them are fatal for the run.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// A configured (survey, year) extract does not exist.
    #[error("Missing {survey} extract for {year}: {path}")]
    MissingFile {
        survey: Survey,
        year: u16,
        path: PathBuf,
    },

    /// Failed to read the file.
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file has no header row.
    #[error("{survey} extract {path} is empty")]
    Empty { survey: Survey, path: PathBuf },

    /// A required column is absent from the header.
    #[error("{survey} extract {path} is missing required column {column}")]
    MissingColumn {
        survey: Survey,
        path: PathBuf,
        column: String,
    },

    /// A cell failed to decode to its documented type.
    #[error("{survey} extract {path}: {source}")]
    InvalidCell {
        survey: Survey,
        path: PathBuf,
        #[source]
        source: CsvError,
    },

    /// Malformed CSV structure.
    #[error("{survey} extract {path}: {source}")]
    Csv {
        survey: Survey,
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

// =============================================================================
// Configuration errors
// =============================================================================

/// Errors while loading or validating [`crate::config::PipelineConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the config file.
    #[error("Config IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid JSON in the config file.
    #[error("Config JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A setting has an unusable value.
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

// =============================================================================
// Output errors
// =============================================================================

/// Errors while validating or publishing the output tables.
#[derive(Debug, Error)]
pub enum OutputError {
    /// Failed to write a table.
    #[error("Output IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV serialisation failed.
    #[error("CSV write error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialisation failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A row does not match the published schema of its table.
    #[error("Table {table}, row {row} violates output schema: {errors:?}")]
    SchemaViolation {
        table: String,
        row: usize,
        errors: Vec<String>,
    },

    /// A table's output path is taken by something other than a regular file.
    #[error("Output path {0} exists and is not a file")]
    NotAFile(PathBuf),

    /// No embedded schema exists for the requested table.
    #[error("Unknown output table: {0}")]
    UnknownTable(String),
}

// =============================================================================
// Pipeline errors (top-level)
// =============================================================================

/// Top-level pipeline orchestration errors.
///
/// Any of these aborts the run before a single output table is published.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Extract loading error.
    #[error("Extract error: {0}")]
    Extract(#[from] ExtractError),

    /// Configuration error.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Output error.
    #[error("Output error: {0}")]
    Output(#[from] OutputError),

    /// A background load task panicked or was cancelled.
    #[error("Extract loader task failed: {0}")]
    Task(String),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for extract loading.
pub type ExtractResult<T> = Result<T, ExtractError>;

/// Result type for configuration.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result type for output operations.
pub type OutputResult<T> = Result<T, OutputError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;
