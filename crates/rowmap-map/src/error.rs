//! Error types for mapper compilation and row mapping.

use thiserror::Error;

use rowmap_convert::{CellError, ConvertError};
use rowmap_model::ModelError;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum MapError {
    /// Strict mode: a column resolved to no property.
    #[error("column '{column}' does not map to any property of {type_name}")]
    UnmappedColumn { column: String, type_name: String },

    /// A required constructor argument has no column feeding it.
    #[error("no column provides constructor argument '{property}' of {type_name}")]
    MissingConstructorValue { type_name: String, property: String },

    /// Two columns resolved to the same property.
    #[error("columns '{first}' and '{second}' both map to '{path}'")]
    DuplicateMapping {
        path: String,
        first: String,
        second: String,
    },

    /// A key column names a collection path that does not exist.
    #[error("key column '{column}' applies to unknown level '{path}'")]
    UnknownKeyLevel { column: String, path: String },

    /// Conversion could not be resolved for a column.
    #[error("column '{column}': {source}")]
    Conversion {
        column: String,
        #[source]
        source: ConvertError,
    },

    /// A cell failed to read or convert and the field-error handler rethrew.
    #[error("row {row}, column '{column}': {source}")]
    Field {
        column: String,
        row: u64,
        #[source]
        source: CellError,
    },

    /// The row has fewer cells than the mapper expects.
    #[error("row {row} has {len} cells, column '{column}' is at index {index}")]
    MissingCell {
        row: u64,
        column: String,
        index: usize,
        len: usize,
    },

    /// The object-construction collaborator rejected its arguments.
    #[error("cannot instantiate {type_name}: {message}")]
    Instantiation { type_name: String, message: String },

    /// A mapped record could not be turned into the requested type.
    #[error("cannot convert mapped {type_name}: {message}")]
    Deserialize { type_name: String, message: String },

    #[error("session already finished")]
    SessionFinished,

    #[error(transparent)]
    Model(#[from] ModelError),
}

pub type Result<T> = std::result::Result<T, MapError>;
