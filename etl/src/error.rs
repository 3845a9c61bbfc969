//! Error types for the star schema ETL.
//!
//! One enum per layer:
//!
//! - [`ExtractError`] - raw sources missing or malformed
//! - [`ConfigError`] - environment and threshold table problems
//! - [`IntegrityError`] - star schema defects caught by the validation gate
//! - [`SinkError`] - per-table persistence failures
//! - [`PipelineError`] - top-level orchestration errors
//!
//! Conversion into [`PipelineError`] is automatic via `From`, so `?` works
//! across layers. Rows dropped for data-quality reasons are not errors; they
//! are counted in [`crate::transform::DropCounts`].

use std::path::PathBuf;
use thiserror::Error;

// =============================================================================
// Extraction Errors
// =============================================================================

/// Errors while reading raw tabular sources.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// A required source file is absent.
    #[error("Missing input '{source_name}': {path} does not exist")]
    MissingInput { source_name: String, path: PathBuf },

    /// An expected column is absent from a raw or intermediate table.
    #[error("Table '{table}' has no column '{column}'")]
    SchemaMismatch { table: String, column: String },

    /// Failed to read file.
    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid CSV content.
    #[error("Invalid CSV format: {0}")]
    Csv(#[from] csv::Error),

    /// Content could not be decoded.
    #[error("Failed to decode content: {0}")]
    Encoding(String),

    /// File has no header line.
    #[error("CSV file '{0}' is empty")]
    EmptyFile(String),
}

// =============================================================================
// Configuration Errors
// =============================================================================

/// Errors while building the run configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable is not set.
    #[error("Missing environment variable {0}")]
    MissingVar(&'static str),

    /// Environment variable holds an unusable value.
    #[error("Invalid value for {name}: {value}")]
    InvalidVar { name: &'static str, value: String },

    /// Thresholds file could not be read.
    #[error("Cannot read thresholds file {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Thresholds file does not match the embedded schema.
    #[error("Thresholds file rejected: {}", .0.join("; "))]
    Schema(Vec<String>),

    /// Thresholds file is not valid JSON for the expected labels.
    #[error("Thresholds JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A bracket table does not partition [0, inf).
    #[error("Invalid bracket table '{table}': {message}")]
    InvalidBrackets { table: &'static str, message: String },
}

// =============================================================================
// Referential Integrity Errors
// =============================================================================

/// A defect in the assembled star schema. Always aborts the run.
#[derive(Debug, Error)]
pub enum IntegrityError {
    /// Surrogate keys are not exactly 1..=N.
    #[error("Dimension '{table}' surrogate keys are not dense from 1: {message}")]
    NonDenseKeys { table: String, message: String },

    /// A fact row references a key absent from its dimension.
    #[error("Fact '{table}' row {row}: {column} = {value} has no match in '{dimension}'")]
    DanglingForeignKey {
        table: String,
        row: usize,
        column: String,
        value: i64,
        dimension: String,
    },

    /// A non-nullable column holds a null or NaN.
    #[error("Table '{table}' row {row}: column {column} is null")]
    NullValue {
        table: String,
        row: usize,
        column: String,
    },

    /// A row does not have one cell per declared column.
    #[error("Table '{table}' row {row}: expected {expected} cells, found {found}")]
    Arity {
        table: String,
        row: usize,
        expected: usize,
        found: usize,
    },

    /// A foreign key points at a dimension the run did not produce.
    #[error("Fact '{table}' references unknown dimension '{dimension}'")]
    UnknownDimension { table: String, dimension: String },
}

// =============================================================================
// Sink Errors
// =============================================================================

/// Errors while persisting a single table.
#[derive(Debug, Error)]
pub enum SinkError {
    /// Filesystem failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV writer failure.
    #[error("CSV write error: {0}")]
    Csv(#[from] csv::Error),

    /// Database failure (connection, DDL or insert).
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Refused to interpolate an identifier into SQL.
    #[error("Invalid SQL identifier: {0}")]
    InvalidIdentifier(String),
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Top-level errors returned by the pipeline entry points.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Extraction error.
    #[error("Extract error: {0}")]
    Extract(#[from] ExtractError),

    /// Configuration error.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Validation gate rejected the star schema.
    #[error("Referential integrity violation: {0}")]
    Integrity(#[from] IntegrityError),

    /// The sink could not be opened at all.
    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for extraction.
pub type ExtractResult<T> = Result<T, ExtractError>;

/// Result type for configuration.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result type for the validation gate.
pub type IntegrityResult<T> = Result<T, IntegrityError>;

/// Result type for sinks.
pub type SinkResult<T> = Result<T, SinkError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion_chain() {
        let extract_err = ExtractError::SchemaMismatch {
            table: "hdi".into(),
            column: "Human Development Index".into(),
        };
        let pipeline_err: PipelineError = extract_err.into();
        assert!(pipeline_err.to_string().contains("Human Development Index"));

        let integrity_err = IntegrityError::NonDenseKeys {
            table: "Dimension_Pays".into(),
            message: "gap at 3".into(),
        };
        let pipeline_err: PipelineError = integrity_err.into();
        assert!(pipeline_err.to_string().contains("Referential integrity"));
    }

    #[test]
    fn test_dangling_key_format() {
        let err = IntegrityError::DanglingForeignKey {
            table: "Fait_SocioEconomique".into(),
            row: 4,
            column: "ID_Pays".into(),
            value: 99,
            dimension: "Dimension_Pays".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("ID_Pays = 99"));
        assert!(msg.contains("Dimension_Pays"));
    }

    #[test]
    fn test_schema_errors_joined() {
        let err = ConfigError::Schema(vec!["a".into(), "b".into()]);
        assert_eq!(err.to_string(), "Thresholds file rejected: a; b");
    }
}
