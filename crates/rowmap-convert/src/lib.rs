//! Cell access and type conversion.
//!
//! A column is compiled into a [`CellPipeline`]: a stateless [`CellReader`]
//! for the source representation, a [`Converter`] resolved from the
//! [`ConversionRegistry`], and the null policy for the target property.
//! [`CellWriter`] covers the opposite direction.

#![deny(unsafe_code)]

pub mod cell;
pub mod context;
pub mod error;
pub mod pipeline;
pub mod reader;
pub mod registry;
pub mod writer;

pub use cell::Cell;
pub use context::ParsingContext;
pub use error::{CellError, ConvertError, Result};
pub use pipeline::{CellPipeline, PipelineRequest, SourceShape};
pub use reader::{CellReader, parse_bool};
pub use registry::{ConversionRegistry, ConvertFn, Converter, cast_numeric, format_scalar};
pub use writer::CellWriter;
