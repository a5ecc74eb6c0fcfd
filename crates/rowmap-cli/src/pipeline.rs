//! Command pipelines: CSV in, mapped objects out.

use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info, info_span};

use rowmap_csv::{CsvSource, CsvWriter, CsvWriterBuilder};
use rowmap_map::{
    CompiledMapper, FieldError, FieldErrorHandler, MapperKey, RecordingHandler, RethrowHandler,
};
use rowmap_model::{FieldErrorStrategy, Value};

use crate::logging::redact_value;
use crate::mapping::MappingFile;

/// Output encoding for mapped objects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// One JSON object per line.
    #[default]
    JsonLines,
    /// Scalar properties written back as CSV.
    Csv,
}

#[derive(Debug, Clone, Default)]
pub struct MapOptions {
    pub format: OutputFormat,
    /// Column names for input without a header row.
    pub columns: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default)]
pub struct MapSummary {
    pub rows: u64,
    pub objects: usize,
    /// Recorded when the mapping file asks for `record`; rows are 1-based
    /// positions in the input.
    pub field_errors: Vec<FieldError>,
}

impl MapSummary {
    pub fn has_errors(&self) -> bool {
        !self.field_errors.is_empty()
    }
}

/// Maps every record of `input` and writes the objects to `out`.
pub fn map_file<W: Write>(
    mapping: &MappingFile,
    input: &Path,
    options: &MapOptions,
    out: W,
) -> Result<MapSummary> {
    let _span = info_span!("map", input = %input.display()).entered();
    let mapper = mapping.mapper()?;
    let mut source = CsvSource::from_path(input, &mapping.dialect)?;
    if let Some(columns) = &options.columns {
        source = source.with_columns(columns.iter().cloned())?;
    }
    let key = source.key()?.clone();
    debug!(columns = %key, grouped = mapping.grouped, "mapping input");

    let mut sink = Sink::new(mapping, options.format, out)?;
    let mut summary = MapSummary::default();
    let record = mapping.config.field_errors == FieldErrorStrategy::Record;

    if mapping.grouped {
        let recorder = RecordingHandler::new();
        let handler: Box<dyn FieldErrorHandler> = if record {
            Box::new(recorder.clone())
        } else {
            Box::new(RethrowHandler)
        };
        let mut session = mapper.session_with_handler(&key, handler)?;
        for row in source.rows() {
            let row = row?;
            summary.rows += 1;
            if let Some(value) = session.push_row(&row)? {
                sink.write(&value)?;
                summary.objects += 1;
            }
        }
        if let Some(value) = session.finish()? {
            sink.write(&value)?;
            summary.objects += 1;
        }
        summary.field_errors = recorder.errors();
    } else {
        for row in source.rows() {
            let row = row?;
            summary.rows += 1;
            let recorder = RecordingHandler::new();
            let handler: Box<dyn FieldErrorHandler> = if record {
                Box::new(recorder.clone())
            } else {
                Box::new(RethrowHandler)
            };
            let mut session = mapper.session_with_handler(&key, handler)?;
            let first = session
                .push_row(&row)
                .with_context(|| format!("record {}", summary.rows))?;
            if let Some(value) = first.or(session.finish()?) {
                sink.write(&value)?;
                summary.objects += 1;
            }
            // Each row runs in its own session; renumber against the input.
            let at = summary.rows;
            summary
                .field_errors
                .extend(recorder.errors().into_iter().map(|e| FieldError { row: at, ..e }));
        }
    }
    sink.finish()?;

    for error in &summary.field_errors {
        debug!(
            column = %error.column,
            row = error.row,
            error = redact_value(&error.error.to_string()),
            "field error"
        );
    }
    info!(
        rows = summary.rows,
        objects = summary.objects,
        field_errors = summary.field_errors.len(),
        "mapping complete"
    );
    Ok(summary)
}

/// The input's columns: `columns` when given, otherwise the header row of
/// `input`.
pub fn input_key(mapping: &MappingFile, input: Option<&Path>, columns: &[String]) -> Result<MapperKey> {
    if !columns.is_empty() {
        return Ok(MapperKey::from_names(columns.iter().cloned())?);
    }
    let input = input.context("either an input file or --columns is required")?;
    let source = CsvSource::from_path(input, &mapping.dialect)?;
    Ok(source.key()?.clone())
}

/// Compiles the mapper a command would use for `key`.
pub fn compile_plan(mapping: &MappingFile, key: &MapperKey) -> Result<Arc<CompiledMapper>> {
    let mapper = mapping.mapper()?;
    mapper
        .compile(key)
        .with_context(|| format!("compile {} for columns {key}", mapping.target.name))
}

enum Sink<W: Write> {
    Json(BufWriter<W>),
    Csv(CsvWriter<BufWriter<W>>),
}

impl<W: Write> Sink<W> {
    fn new(mapping: &MappingFile, format: OutputFormat, out: W) -> Result<Self> {
        let out = BufWriter::new(out);
        Ok(match format {
            OutputFormat::JsonLines => Self::Json(out),
            OutputFormat::Csv => Self::Csv(
                CsvWriterBuilder::new(mapping.target_meta()?)
                    .dialect(mapping.dialect.clone())
                    .context(mapping.context.build())
                    .build(out)?,
            ),
        })
    }

    fn write(&mut self, value: &Value) -> Result<()> {
        match self {
            Self::Json(out) => {
                serde_json::to_writer(&mut *out, value)?;
                out.write_all(b"\n")?;
            }
            Self::Csv(writer) => writer.write(value)?,
        }
        Ok(())
    }

    fn finish(self) -> Result<()> {
        match self {
            Self::Json(mut out) => out.flush()?,
            Self::Csv(mut writer) => writer.flush()?,
        }
        Ok(())
    }
}
