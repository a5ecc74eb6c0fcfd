//! Borrowed view of one source cell.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use rowmap_model::Value;

/// One cell as handed out by a row source.
///
/// Text sources produce [`Cell::Text`]; typed driver rows produce the
/// matching typed variant. An empty text cell reads as null.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Cell<'a> {
    Null,
    Text(&'a str),
    Bool(bool),
    Char(char),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Time(NaiveTime),
}

impl<'a> Cell<'a> {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null | Self::Text(""))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Text(_) => "text",
            Self::Bool(_) => "bool",
            Self::Char(_) => "char",
            Self::I8(_) => "i8",
            Self::I16(_) => "i16",
            Self::I32(_) => "i32",
            Self::I64(_) => "i64",
            Self::F32(_) => "f32",
            Self::F64(_) => "f64",
            Self::Date(_) => "date",
            Self::DateTime(_) => "datetime",
            Self::Time(_) => "time",
        }
    }

    /// Owned copy of the raw cell, without any conversion.
    pub fn to_value(&self) -> Value {
        match *self {
            Self::Null | Self::Text("") => Value::Null,
            Self::Text(s) => Value::Text(s.to_string()),
            Self::Bool(v) => Value::Bool(v),
            Self::Char(v) => Value::Char(v),
            Self::I8(v) => Value::I8(v),
            Self::I16(v) => Value::I16(v),
            Self::I32(v) => Value::I32(v),
            Self::I64(v) => Value::I64(v),
            Self::F32(v) => Value::F32(v),
            Self::F64(v) => Value::F64(v),
            Self::Date(v) => Value::Date(v),
            Self::DateTime(v) => Value::DateTime(v),
            Self::Time(v) => Value::Time(v),
        }
    }

    /// Borrows a scalar [`Value`] as a cell. Lists and records read as null.
    pub fn from_value(value: &'a Value) -> Self {
        match value {
            Value::Text(s) => Self::Text(s),
            Value::Bool(v) => Self::Bool(*v),
            Value::Char(v) => Self::Char(*v),
            Value::I8(v) => Self::I8(*v),
            Value::I16(v) => Self::I16(*v),
            Value::I32(v) => Self::I32(*v),
            Value::I64(v) => Self::I64(*v),
            Value::F32(v) => Self::F32(*v),
            Value::F64(v) => Self::F64(*v),
            Value::Date(v) => Self::Date(*v),
            Value::DateTime(v) => Self::DateTime(*v),
            Value::Time(v) => Self::Time(*v),
            Value::Null | Value::List(_) | Value::Record(_) => Self::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_is_null() {
        assert!(Cell::Text("").is_null());
        assert_eq!(Cell::Text("").to_value(), Value::Null);
        assert_eq!(Cell::Text("x").to_value(), Value::text("x"));
    }
}
