//! Write mode: typed value to text.

use std::sync::Arc;

use rowmap_model::Value;

use crate::context::ParsingContext;
use crate::error::ConvertError;
use crate::reader::CellReader;
use crate::registry::format_scalar;

/// Formats one column's values as text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CellWriter {
    format: Option<Arc<str>>,
}

impl CellWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Writer with a date/time pattern, validated up front.
    pub fn with_format(pattern: &str) -> Result<Self, ConvertError> {
        // Reuse the reader's pattern validation.
        let format = match CellReader::for_kind(rowmap_model::ScalarKind::Date, Some(pattern))? {
            CellReader::Date { format } => format,
            _ => None,
        };
        Ok(Self { format })
    }

    pub fn format(&self) -> Option<&str> {
        self.format.as_deref()
    }

    /// Appends the text form of `value`; null writes nothing.
    pub fn write_into(&self, value: &Value, ctx: &ParsingContext, out: &mut String) {
        out.push_str(&format_scalar(value, self.format.as_deref(), ctx));
    }

    pub fn write(&self, value: &Value, ctx: &ParsingContext) -> String {
        format_scalar(value, self.format.as_deref(), ctx)
    }
}
