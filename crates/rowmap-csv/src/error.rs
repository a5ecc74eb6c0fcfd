//! Error types for CSV reading and writing.

use std::path::PathBuf;

use thiserror::Error;

use rowmap_convert::ConvertError;
use rowmap_map::MapError;
use rowmap_model::ModelError;

/// Errors that can occur while reading or writing CSV.
#[derive(Debug, Error)]
pub enum CsvError {
    /// CSV file not found.
    #[error("CSV file not found: {path}")]
    FileNotFound { path: PathBuf },

    /// Failed to open or write a file.
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write to the output stream.
    #[error("failed to write CSV: {0}")]
    Write(#[source] std::io::Error),

    /// The encoder failed to write a record.
    #[error("failed to write CSV record: {0}")]
    WriteRecord(#[source] csv::Error),

    /// The tokenizer rejected the input.
    #[error("failed to parse CSV at line {line}: {source}")]
    Parse {
        line: u64,
        #[source]
        source: csv::Error,
    },

    /// Input without a header row and no column names given.
    #[error("no header row and no column names")]
    MissingHeaders,

    /// Separator or quote the tokenizer cannot use.
    #[error("invalid CSV dialect: {0}")]
    InvalidDialect(String),

    /// A written column names no property of the target type.
    #[error("column '{column}' is not a property path of {type_name}")]
    UnknownColumn { column: String, type_name: String },

    #[error(transparent)]
    Map(#[from] MapError),

    #[error(transparent)]
    Convert(#[from] ConvertError),

    #[error(transparent)]
    Model(#[from] ModelError),
}

impl CsvError {
    pub(crate) fn parse(source: csv::Error) -> Self {
        let line = source.position().map_or(0, csv::Position::line);
        Self::Parse { line, source }
    }

    pub(crate) fn open(path: PathBuf, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::FileNotFound { path }
        } else {
            Self::Io { path, source }
        }
    }
}

/// Result type for CSV operations.
pub type Result<T> = std::result::Result<T, CsvError>;
