//! CSV input and output for the row mapper.
//!
//! [`CsvSource`] turns CSV records into rows for a [`rowmap_map::RowMapper`];
//! [`CsvWriter`] writes mapped objects back as CSV using the same cell
//! formats, so written files read back into equal objects.

#![deny(unsafe_code)]

pub mod dialect;
pub mod error;
pub mod reader;
pub mod writer;

pub use dialect::CsvDialect;
pub use error::{CsvError, Result};
pub use reader::{CsvMapped, CsvRow, CsvSource};
pub use writer::{CsvWriter, CsvWriterBuilder};
