//! Error types for cell reading and conversion.

use thiserror::Error;

use rowmap_model::{ScalarKind, SqlType};

/// Build-time resolution failures. Raised once, while a pipeline is compiled.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConvertError {
    /// No identity, direct, chained or factory conversion exists.
    #[error("no conversion from {from} to {to}")]
    UnsupportedConversion { from: String, to: String },

    /// The declared source type forbids the requested representation.
    #[error("declared type {declared} cannot be narrowed to {to}")]
    UnsupportedNarrowing { declared: SqlType, to: ScalarKind },

    /// Declared type the engine cannot read.
    #[error("unsupported declared source type: {0}")]
    UnsupportedSource(SqlType),

    /// Driver column without a declared type feeding a target the driver
    /// never produces on its own.
    #[error("column has no declared type; a driver cannot provide {0} values")]
    UndeclaredSource(ScalarKind),

    /// Column asked for a converter that is not registered.
    #[error("unknown converter: {0}")]
    UnknownConverter(String),

    /// Named converter output does not fit the target property.
    #[error("converter '{name}' produces {produces}, target needs {target}")]
    ConverterMismatch {
        name: String,
        produces: ScalarKind,
        target: String,
    },

    /// Date/time pattern that chrono cannot interpret.
    #[error("invalid format pattern {0:?}")]
    InvalidFormat(String),

    /// Column default that does not read as the target type.
    #[error("default value {value:?} is not a valid {target}: {message}")]
    InvalidDefault {
        value: String,
        target: String,
        message: String,
    },
}

/// Per-cell failures raised while reading or converting a value.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CellError {
    #[error("cannot parse {value:?} as {kind}")]
    Parse { kind: ScalarKind, value: String },

    #[error("expected a {expected} cell, found {found}")]
    UnexpectedCell {
        expected: &'static str,
        found: &'static str,
    },

    #[error("null value where a value is required")]
    Null,

    #[error("{value:?} is not a variant of {type_name}")]
    UnknownVariant { type_name: String, value: String },

    #[error("cannot convert {from} to {to}: {message}")]
    Conversion {
        from: &'static str,
        to: ScalarKind,
        message: String,
    },
}

pub type Result<T> = std::result::Result<T, ConvertError>;
