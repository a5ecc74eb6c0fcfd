//! Row-to-object mapping engine.
//!
//! A [`RowMapper`] compiles, once per column signature, a [`CompiledMapper`]
//! that routes every column to a property of the target type tree. Rows are
//! then pushed through a [`MappingSession`], which buffers values in
//! [`DelayedCellSetter`]s and uses one [`BreakDetector`] per nesting level to
//! decide where one object ends and the next begins.
//!
//! ```text
//! MapperKey ──► MapperCache ──► CompiledMapper ──► MappingSession ──► Value
//! ```

#![deny(unsafe_code)]

pub mod breaker;
pub mod cache;
pub mod definitions;
pub mod error;
pub mod facade;
pub mod handler;
pub mod instantiate;
pub mod key;
pub mod plan;
pub mod resolve;
pub mod row;
pub mod session;
pub mod setter;

pub use breaker::BreakDetector;
pub use cache::MapperCache;
pub use definitions::ColumnDefinitions;
pub use error::{MapError, Result};
pub use facade::{MappedRows, RowMapper};
pub use handler::{FieldError, FieldErrorHandler, RecordingHandler, RethrowHandler, handler_for};
pub use instantiate::{Instantiator, RecordInstantiator, from_value};
pub use key::{
    CanonicalColumn, CanonicalKey, CsvKeyComparator, DriverKeyComparator, Family, KeyComparator,
    MapperKey, MapperScope, TypeCompatibility,
};
pub use plan::{ColumnPlan, CompileOptions, CompiledMapper, KeyColumn, LevelPlan, Routing};
pub use resolve::{PathResolver, PathStep, PropertyPath};
pub use row::Row;
pub use session::{AssemblyState, MappingSession};
pub use setter::DelayedCellSetter;
