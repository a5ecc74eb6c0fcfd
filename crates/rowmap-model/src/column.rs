//! Source column keys and declared source types.

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};
use crate::options::CaseSensitivity;
use crate::value::ScalarKind;

/// Declared (driver-side) type of a source column.
///
/// Unknown type names are kept verbatim in [`SqlType::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum SqlType {
    Boolean,
    TinyInt,
    SmallInt,
    Integer,
    BigInt,
    Real,
    Double,
    Numeric,
    Char,
    Varchar,
    Text,
    Date,
    Timestamp,
    Time,
    Other(String),
}

impl SqlType {
    /// Kind of value a driver hands out for a column of this type.
    ///
    /// `None` for types the engine cannot read natively.
    pub fn source_kind(&self) -> Option<ScalarKind> {
        Some(match self {
            Self::Boolean => ScalarKind::Bool,
            Self::TinyInt => ScalarKind::I8,
            Self::SmallInt => ScalarKind::I16,
            Self::Integer => ScalarKind::I32,
            Self::BigInt => ScalarKind::I64,
            Self::Real => ScalarKind::F32,
            Self::Double | Self::Numeric => ScalarKind::F64,
            Self::Char | Self::Varchar | Self::Text => ScalarKind::Text,
            Self::Date => ScalarKind::Date,
            Self::Timestamp => ScalarKind::DateTime,
            Self::Time => ScalarKind::Time,
            Self::Other(_) => return None,
        })
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Boolean => "boolean",
            Self::TinyInt => "tinyint",
            Self::SmallInt => "smallint",
            Self::Integer => "integer",
            Self::BigInt => "bigint",
            Self::Real => "real",
            Self::Double => "double",
            Self::Numeric => "numeric",
            Self::Char => "char",
            Self::Varchar => "varchar",
            Self::Text => "text",
            Self::Date => "date",
            Self::Timestamp => "timestamp",
            Self::Time => "time",
            Self::Other(name) => name,
        }
    }
}

impl FromStr for SqlType {
    type Err = Infallible;

    fn from_str(raw: &str) -> std::result::Result<Self, Self::Err> {
        let lowered = raw.trim().to_lowercase();
        // Drop length/precision suffixes: varchar(20), numeric(10,2).
        let base = lowered.split('(').next().unwrap_or_default().trim();
        Ok(match base {
            "bool" | "boolean" | "bit" => Self::Boolean,
            "tinyint" | "int1" => Self::TinyInt,
            "smallint" | "int2" => Self::SmallInt,
            "int" | "integer" | "int4" | "mediumint" => Self::Integer,
            "bigint" | "int8" => Self::BigInt,
            "real" | "float4" => Self::Real,
            "double" | "double precision" | "float" | "float8" => Self::Double,
            "numeric" | "decimal" | "money" => Self::Numeric,
            "char" | "nchar" | "character" => Self::Char,
            "varchar" | "nvarchar" | "character varying" | "ascii" => Self::Varchar,
            "text" | "ntext" | "clob" | "string" => Self::Text,
            "date" => Self::Date,
            "timestamp" | "datetime" | "datetime2" | "smalldatetime" => Self::Timestamp,
            "time" => Self::Time,
            _ => Self::Other(lowered),
        })
    }
}

impl From<String> for SqlType {
    fn from(value: String) -> Self {
        match value.parse() {
            Ok(parsed) => parsed,
            Err(never) => match never {},
        }
    }
}

impl From<SqlType> for String {
    fn from(value: SqlType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One source column: its name, position in the row, and optional
/// declared type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnKey {
    name: String,
    index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    declared_type: Option<SqlType>,
}

impl ColumnKey {
    pub fn new(name: impl Into<String>, index: usize) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ModelError::InvalidColumnName(name));
        }
        Ok(Self {
            name,
            index,
            declared_type: None,
        })
    }

    #[must_use]
    pub fn with_declared_type(mut self, declared_type: SqlType) -> Self {
        self.declared_type = Some(declared_type);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn declared_type(&self) -> Option<&SqlType> {
        self.declared_type.as_ref()
    }

    /// Same column under another name; index and declared type are kept.
    #[must_use]
    pub fn alias(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            index: self.index,
            declared_type: self.declared_type.clone(),
        }
    }

    pub fn name_matches(&self, name: &str, case: CaseSensitivity) -> bool {
        match case {
            CaseSensitivity::Sensitive => self.name == name,
            CaseSensitivity::Insensitive => self.name.eq_ignore_ascii_case(name),
        }
    }
}

impl fmt::Display for ColumnKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.declared_type {
            Some(t) => write!(f, "{}#{}:{}", self.name, self.index, t),
            None => write!(f, "{}#{}", self.name, self.index),
        }
    }
}
