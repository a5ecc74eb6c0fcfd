//! Data model for mapping flat rows into object graphs.
//!
//! - [`ColumnKey`] / [`SqlType`]: one source column and its declared type
//! - [`ColumnDefinition`]: per-column options (rename, ignore, key, format, ...)
//! - [`TypeMeta`] / [`PropertyMeta`] / [`ValueType`]: the target property tree
//! - [`Value`] / [`Record`] / [`Primitive`]: mapped values
//! - [`MapperConfig`]: resolution and null handling options

#![deny(unsafe_code)]

pub mod column;
pub mod definition;
pub mod error;
pub mod meta;
pub mod options;
pub mod value;

pub use column::{ColumnKey, SqlType};
pub use definition::{ColumnDefinition, ColumnProperty, KeyScope, PropertyKind};
pub use error::{ModelError, Result};
pub use meta::{Binding, EnumMeta, PropertyMeta, TypeMeta, TypeMetaBuilder, ValueType};
pub use options::{
    CaseSensitivity, FieldErrorStrategy, MapperConfig, NullPolicy, UnmappedColumnPolicy,
};
pub use value::{Primitive, Record, ScalarKind, Value};
