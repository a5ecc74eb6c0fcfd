//! CSV writer for mapped objects.
//!
//! Columns are property paths of the target type (`address.street`), each
//! with its own [`CellWriter`]. Without an explicit column list every
//! scalar property reachable through nested objects is written, in
//! declaration order. Quoting and line endings are left to the `csv` crate.

use std::io::Write;
use std::sync::Arc;

use csv::WriterBuilder;
use tracing::debug;

use rowmap_convert::{CellWriter, ParsingContext};
use rowmap_model::{TypeMeta, Value, ValueType};

use crate::dialect::CsvDialect;
use crate::error::{CsvError, Result};

#[derive(Debug, Clone)]
struct WriteColumn {
    header: String,
    path: Vec<String>,
    writer: CellWriter,
}

/// Configures a [`CsvWriter`].
#[derive(Debug, Clone)]
pub struct CsvWriterBuilder {
    meta: Arc<TypeMeta>,
    dialect: CsvDialect,
    context: ParsingContext,
    columns: Vec<(String, Option<String>)>,
}

impl CsvWriterBuilder {
    pub fn new(meta: Arc<TypeMeta>) -> Self {
        Self {
            meta,
            dialect: CsvDialect::default(),
            context: ParsingContext::default(),
            columns: Vec::new(),
        }
    }

    #[must_use]
    pub fn dialect(mut self, dialect: CsvDialect) -> Self {
        self.dialect = dialect;
        self
    }

    #[must_use]
    pub fn context(mut self, context: ParsingContext) -> Self {
        self.context = context;
        self
    }

    /// Writes only the named columns, in the order they are added.
    #[must_use]
    pub fn column(mut self, path: impl Into<String>) -> Self {
        self.columns.push((path.into(), None));
        self
    }

    /// Adds a column written with a date/time pattern.
    #[must_use]
    pub fn column_with_format(mut self, path: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.columns.push((path.into(), Some(pattern.into())));
        self
    }

    pub fn build<W: Write>(self, out: W) -> Result<CsvWriter<W>> {
        let requested = if self.columns.is_empty() {
            let mut leaves = Vec::new();
            scalar_leaves(&self.meta, "", &mut leaves);
            leaves.into_iter().map(|path| (path, None)).collect()
        } else {
            self.columns
        };

        let mut columns = Vec::with_capacity(requested.len());
        for (header, format) in requested {
            let path: Vec<String> = header.split('.').map(str::to_string).collect();
            if !is_scalar_path(&self.meta, &path) {
                return Err(CsvError::UnknownColumn {
                    column: header,
                    type_name: self.meta.name().to_string(),
                });
            }
            let writer = match format {
                Some(pattern) => CellWriter::with_format(&pattern)?,
                None => CellWriter::new(),
            };
            columns.push(WriteColumn {
                header,
                path,
                writer,
            });
        }
        let out = WriterBuilder::new()
            .delimiter(self.dialect.separator_byte()?)
            .quote(self.dialect.quote_byte()?)
            .quote_style(self.dialect.quote_style())
            .terminator(self.dialect.terminator()?)
            .from_writer(out);
        debug!(columns = columns.len(), target_type = self.meta.name(), "CSV writer ready");

        Ok(CsvWriter {
            out,
            header_pending: self.dialect.has_headers,
            context: self.context,
            columns,
            cells: Vec::new(),
        })
    }
}

/// Writes mapped objects as CSV records.
#[derive(Debug)]
pub struct CsvWriter<W: Write> {
    out: csv::Writer<W>,
    context: ParsingContext,
    columns: Vec<WriteColumn>,
    header_pending: bool,
    /// Reused text buffers, one per column.
    cells: Vec<String>,
}

impl<W: Write> CsvWriter<W> {
    /// Column headers, in output order.
    pub fn headers(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.header.as_str())
    }

    /// Writes one object; the header row goes out first.
    pub fn write(&mut self, value: &Value) -> Result<()> {
        if self.header_pending {
            self.header_pending = false;
            self.out
                .write_record(self.columns.iter().map(|c| c.header.as_str()))
                .map_err(CsvError::WriteRecord)?;
        }

        self.cells.resize_with(self.columns.len(), String::new);
        for (column, text) in self.columns.iter().zip(&mut self.cells) {
            text.clear();
            if let Some(cell) = lookup(value, &column.path) {
                column.writer.write_into(cell, &self.context, text);
            }
        }
        self.out
            .write_record(&self.cells)
            .map_err(CsvError::WriteRecord)
    }

    pub fn write_all<'a, I>(&mut self, values: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a Value>,
    {
        for value in values {
            self.write(value)?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.out.flush().map_err(CsvError::Write)
    }

    pub fn into_inner(self) -> Result<W> {
        self.out
            .into_inner()
            .map_err(|err| CsvError::Write(err.into_error()))
    }
}

fn scalar_leaves(meta: &TypeMeta, prefix: &str, out: &mut Vec<String>) {
    for property in meta.properties() {
        let path = if prefix.is_empty() {
            property.name().to_string()
        } else {
            format!("{prefix}.{}", property.name())
        };
        match property.value_type().unwrapped() {
            ValueType::Scalar(_) | ValueType::Enum(_) => out.push(path),
            ValueType::Object(nested) => scalar_leaves(nested, &path, out),
            ValueType::List(_) | ValueType::Optional(_) => {}
        }
    }
}

fn is_scalar_path(meta: &TypeMeta, path: &[String]) -> bool {
    let Some((head, rest)) = path.split_first() else {
        return false;
    };
    let Some(property) = meta.property_index(head).and_then(|i| meta.property(i)) else {
        return false;
    };
    match (property.value_type().unwrapped(), rest.is_empty()) {
        (ValueType::Scalar(_) | ValueType::Enum(_), true) => true,
        (ValueType::Object(nested), false) => is_scalar_path(nested, rest),
        _ => false,
    }
}

fn lookup<'a>(value: &'a Value, path: &[String]) -> Option<&'a Value> {
    path.iter()
        .try_fold(value, |current, name| current.as_record()?.get(name))
}

#[cfg(test)]
mod tests {
    use rowmap_model::{Record, ScalarKind};

    use super::*;

    fn person() -> Arc<TypeMeta> {
        let address = TypeMeta::builder("Address")
            .property("city", ValueType::optional(ValueType::scalar(ScalarKind::Text)))
            .build()
            .unwrap();
        TypeMeta::builder("Person")
            .constructor_arg("id", ValueType::scalar(ScalarKind::I32))
            .property("name", ValueType::optional(ValueType::scalar(ScalarKind::Text)))
            .property("address", ValueType::object(address))
            .property("tags", ValueType::list(ValueType::scalar(ScalarKind::Text)))
            .build()
            .unwrap()
    }

    fn ada() -> Value {
        let meta = person();
        let mut address = Record::new(Arc::clone(meta.property(2).unwrap().value_type().object_meta().unwrap()));
        address.set_index(0, Value::text("London, UK"));
        let mut record = Record::new(meta);
        record.set_index(0, Value::I32(1));
        record.set_index(1, Value::text("Ada \"A\" King"));
        record.set_index(2, Value::Record(address));
        Value::Record(record)
    }

    fn written(builder: CsvWriterBuilder) -> String {
        let mut writer = builder.build(Vec::new()).unwrap();
        writer.write(&ada()).unwrap();
        String::from_utf8(writer.into_inner().unwrap()).unwrap()
    }

    #[test]
    fn default_columns_are_scalar_leaves() {
        let writer = CsvWriterBuilder::new(person()).build(Vec::new()).unwrap();
        assert_eq!(writer.headers().collect::<Vec<_>>(), vec!["id", "name", "address.city"]);
    }

    #[test]
    fn quoting_and_headers() {
        insta::assert_snapshot!(written(CsvWriterBuilder::new(person())), @r#"
        id,name,address.city
        1,"Ada ""A"" King","London, UK"
        "#);
    }

    #[test]
    fn column_subset_without_header() {
        let dialect = CsvDialect::default()
            .with_headers(false)
            .with_separator(';')
            .with_always_escape(true)
            .with_line_terminator("\r\n");
        let out = written(CsvWriterBuilder::new(person()).dialect(dialect).column("id"));
        assert_eq!(out, "\"1\"\r\n");
    }

    #[test]
    fn unsupported_terminator_is_rejected() {
        let dialect = CsvDialect::default().with_line_terminator("\n\n");
        let err = CsvWriterBuilder::new(person()).dialect(dialect).build(Vec::new()).unwrap_err();
        assert!(matches!(err, CsvError::InvalidDialect(_)));
    }

    #[test]
    fn unknown_or_nested_list_columns_are_rejected() {
        for bad in ["nope", "tags", "address", "address.zip"] {
            let err = CsvWriterBuilder::new(person()).column(bad).build(Vec::new()).unwrap_err();
            assert!(matches!(err, CsvError::UnknownColumn { .. }), "{bad}");
        }
    }
}
