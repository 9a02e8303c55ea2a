use std::path::PathBuf;

use thiserror::Error;

use crate::types::DataType;

/// Convenience result type for ingestion operations.
pub type IngestionResult<T> = Result<T, IngestionError>;

/// Convenience result type for aggregation / partitioning operations.
pub type ProcessingResult<T> = Result<T, ProcessingError>;

/// A single row failed validation against the schema registry.
///
/// These are recovered by the loader (the row is skipped and counted); they only surface to callers
/// through [`crate::ingestion::RejectedRow`] samples or inside [`IngestionError::SchemaMismatch`]
/// when the header itself is unusable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// A required column is absent (from the header, or from the row).
    #[error("missing column '{column}'")]
    MissingColumn { column: String },

    /// A value could not be coerced into the column's [`DataType`].
    #[error("column '{column}' expected {expected}, got '{raw}'")]
    TypeMismatch {
        column: String,
        expected: DataType,
        raw: String,
    },

    /// An empty cell in a column that does not accept nulls.
    #[error("null in non-nullable column '{column}'")]
    NullInNonNullableColumn { column: String },

    /// The row does not have as many fields as the header.
    #[error("expected {expected} fields, found {found}")]
    FieldCount { expected: usize, found: usize },
}

/// Error type returned by the loader.
#[derive(Debug, Error)]
pub enum IngestionError {
    /// Underlying I/O error (e.g. file not found, permission denied).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV reader error that is not attributable to a single row.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// Invalid glob pattern for a multi-file source.
    #[error("invalid source pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    /// The input header does not conform to the schema registry.
    #[error("schema mismatch: {0}")]
    SchemaMismatch(SchemaError),

    /// The source resolved to no input files.
    #[error("no input files matched source '{source_desc}'")]
    EmptySource { source_desc: String },

    /// More rows were skipped than the configured maximum; nothing was stored.
    #[error("load aborted: {skipped} bad rows exceeds max_bad_records={max_bad_records}")]
    LoadAborted {
        skipped: usize,
        max_bad_records: usize,
    },
}

/// Error type returned by aggregation, classification and partitioning.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProcessingError {
    /// A query referenced a field that is not part of the dataset schema.
    #[error("unknown column '{0}'")]
    UnknownColumn(String),

    /// A derived column would shadow a column the dataset already has.
    #[error("column '{0}' already exists")]
    DuplicateColumn(String),

    /// A column has the wrong type for the requested operation.
    #[error("column '{column}' must be {expected} for this operation")]
    ColumnType { column: String, expected: DataType },

    /// A partition range is empty or inverted.
    #[error("invalid range [{lo}, {hi}): lower bound must be below upper bound")]
    InvalidRange { lo: i64, hi: i64 },
}

/// Error type returned by the report emitter.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("json encoding failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("csv encoding failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("csv output was not valid utf-8")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("csv writer flush failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Error type returned while layering and validating [`crate::config::PipelineConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An explicitly requested config file is absent.
    #[error("config file {} does not exist", .0.display())]
    FileNotFound(PathBuf),

    /// A source could not be read or the merged values do not fit the sections.
    #[error("invalid pipeline configuration: {0}")]
    Layering(#[from] ::config::ConfigError),

    #[error("delimiter must be a single ASCII character, got {0:?}")]
    Delimiter(String),

    #[error("invalid partition range: {0}")]
    Partition(#[from] ProcessingError),
}
