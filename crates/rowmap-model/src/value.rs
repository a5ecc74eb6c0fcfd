//! Values produced by the mapping engine.
//!
//! [`Primitive`] is the unboxed, `Copy` form used on the hot path for the
//! eight primitive kinds. [`Value`] is the general form that also carries
//! text, dates, lists and nested [`Record`]s.

use std::fmt;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Serialize, Serializer};

use crate::meta::TypeMeta;

/// Scalar kinds a cell can be read as or converted into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalarKind {
    Bool,
    Char,
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
    Text,
    Date,
    DateTime,
    Time,
}

impl ScalarKind {
    /// All scalar kinds, primitives first.
    pub const ALL: [ScalarKind; 12] = [
        Self::Bool,
        Self::Char,
        Self::I8,
        Self::I16,
        Self::I32,
        Self::I64,
        Self::F32,
        Self::F64,
        Self::Text,
        Self::Date,
        Self::DateTime,
        Self::Time,
    ];

    /// True for the eight kinds that have an unboxed [`Primitive`] form.
    pub fn is_primitive(self) -> bool {
        !matches!(self, Self::Text | Self::Date | Self::DateTime | Self::Time)
    }

    pub fn is_integer(self) -> bool {
        matches!(self, Self::I8 | Self::I16 | Self::I32 | Self::I64)
    }

    pub fn is_numeric(self) -> bool {
        self.is_integer() || matches!(self, Self::F32 | Self::F64)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Char => "char",
            Self::I8 => "i8",
            Self::I16 => "i16",
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::F32 => "f32",
            Self::F64 => "f64",
            Self::Text => "text",
            Self::Date => "date",
            Self::DateTime => "datetime",
            Self::Time => "time",
        }
    }
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unboxed primitive value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Primitive {
    Bool(bool),
    Char(char),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
}

impl Primitive {
    pub fn kind(self) -> ScalarKind {
        match self {
            Self::Bool(_) => ScalarKind::Bool,
            Self::Char(_) => ScalarKind::Char,
            Self::I8(_) => ScalarKind::I8,
            Self::I16(_) => ScalarKind::I16,
            Self::I32(_) => ScalarKind::I32,
            Self::I64(_) => ScalarKind::I64,
            Self::F32(_) => ScalarKind::F32,
            Self::F64(_) => ScalarKind::F64,
        }
    }

    /// The zero value used for a null cell targeting an unboxed primitive.
    ///
    /// Returns `None` for non-primitive kinds.
    pub fn zero(kind: ScalarKind) -> Option<Self> {
        Some(match kind {
            ScalarKind::Bool => Self::Bool(false),
            ScalarKind::Char => Self::Char('\0'),
            ScalarKind::I8 => Self::I8(0),
            ScalarKind::I16 => Self::I16(0),
            ScalarKind::I32 => Self::I32(0),
            ScalarKind::I64 => Self::I64(0),
            ScalarKind::F32 => Self::F32(0.0),
            ScalarKind::F64 => Self::F64(0.0),
            ScalarKind::Text | ScalarKind::Date | ScalarKind::DateTime | ScalarKind::Time => {
                return None;
            }
        })
    }
}

impl From<Primitive> for Value {
    fn from(value: Primitive) -> Self {
        match value {
            Primitive::Bool(v) => Self::Bool(v),
            Primitive::Char(v) => Self::Char(v),
            Primitive::I8(v) => Self::I8(v),
            Primitive::I16(v) => Self::I16(v),
            Primitive::I32(v) => Self::I32(v),
            Primitive::I64(v) => Self::I64(v),
            Primitive::F32(v) => Self::F32(v),
            Primitive::F64(v) => Self::F64(v),
        }
    }
}

/// A mapped value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Char(char),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Text(String),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Time(NaiveTime),
    List(Vec<Value>),
    Record(Record),
}

impl Value {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Scalar kind of this value, `None` for null, lists and records.
    pub fn scalar_kind(&self) -> Option<ScalarKind> {
        Some(match self {
            Self::Bool(_) => ScalarKind::Bool,
            Self::Char(_) => ScalarKind::Char,
            Self::I8(_) => ScalarKind::I8,
            Self::I16(_) => ScalarKind::I16,
            Self::I32(_) => ScalarKind::I32,
            Self::I64(_) => ScalarKind::I64,
            Self::F32(_) => ScalarKind::F32,
            Self::F64(_) => ScalarKind::F64,
            Self::Text(_) => ScalarKind::Text,
            Self::Date(_) => ScalarKind::Date,
            Self::DateTime(_) => ScalarKind::DateTime,
            Self::Time(_) => ScalarKind::Time,
            Self::Null | Self::List(_) | Self::Record(_) => return None,
        })
    }

    pub fn as_primitive(&self) -> Option<Primitive> {
        Some(match *self {
            Self::Bool(v) => Primitive::Bool(v),
            Self::Char(v) => Primitive::Char(v),
            Self::I8(v) => Primitive::I8(v),
            Self::I16(v) => Primitive::I16(v),
            Self::I32(v) => Primitive::I32(v),
            Self::I64(v) => Primitive::I64(v),
            Self::F32(v) => Primitive::F32(v),
            Self::F64(v) => Primitive::F64(v),
            _ => return None,
        })
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Self::I8(v) => Some(i64::from(v)),
            Self::I16(v) => Some(i64::from(v)),
            Self::I32(v) => Some(i64::from(v)),
            Self::I64(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Self::Record(record) => Some(record),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::I32(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::I64(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_none(),
            Self::Bool(v) => serializer.serialize_bool(*v),
            Self::Char(v) => serializer.serialize_char(*v),
            Self::I8(v) => serializer.serialize_i8(*v),
            Self::I16(v) => serializer.serialize_i16(*v),
            Self::I32(v) => serializer.serialize_i32(*v),
            Self::I64(v) => serializer.serialize_i64(*v),
            Self::F32(v) => serializer.serialize_f32(*v),
            Self::F64(v) => serializer.serialize_f64(*v),
            Self::Text(v) => serializer.serialize_str(v),
            Self::Date(v) => v.serialize(serializer),
            Self::DateTime(v) => v.serialize(serializer),
            Self::Time(v) => v.serialize(serializer),
            Self::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Self::Record(record) => record.serialize(serializer),
        }
    }
}

/// An instance of a [`TypeMeta`]: one value per declared property, in
/// declaration order.
#[derive(Debug, Clone)]
pub struct Record {
    meta: Arc<TypeMeta>,
    fields: Vec<Value>,
}

impl Record {
    /// Creates a record with every property set to its type's default.
    pub fn new(meta: Arc<TypeMeta>) -> Self {
        let fields = meta
            .properties()
            .iter()
            .map(|p| p.value_type().default_value())
            .collect();
        Self { meta, fields }
    }

    pub fn meta(&self) -> &Arc<TypeMeta> {
        &self.meta
    }

    pub fn type_name(&self) -> &str {
        self.meta.name()
    }

    pub fn fields(&self) -> &[Value] {
        &self.fields
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        let index = self.meta.property_index(name)?;
        self.fields.get(index)
    }

    pub fn get_index(&self, index: usize) -> Option<&Value> {
        self.fields.get(index)
    }

    pub fn field_mut(&mut self, index: usize) -> Option<&mut Value> {
        self.fields.get_mut(index)
    }

    /// Sets the property at `index`. Out-of-range indices are ignored.
    pub fn set_index(&mut self, index: usize, value: Value) {
        if let Some(slot) = self.fields.get_mut(index) {
            *slot = value;
        }
    }

    /// Iterates `(property name, value)` pairs in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.meta
            .properties()
            .iter()
            .map(|p| p.name())
            .zip(self.fields.iter())
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.meta.name() == other.meta.name() && self.fields == other.fields
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in self.iter() {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}
