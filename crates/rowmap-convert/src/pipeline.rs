//! Per-column cell pipelines: reader, converter and null handling composed
//! once at build time.

use rowmap_model::{NullPolicy, Primitive, ScalarKind, SqlType, Value, ValueType};

use crate::cell::Cell;
use crate::context::ParsingContext;
use crate::error::{CellError, ConvertError, Result};
use crate::reader::CellReader;
use crate::registry::{ConversionRegistry, Converter};

/// Shape of the cells a row source hands out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourceShape {
    /// Every cell is text (CSV and similar).
    #[default]
    Text,
    /// Cells are typed by the driver according to the declared column type.
    Native,
}

/// Everything needed to compile one column's pipeline.
#[derive(Debug, Clone)]
pub struct PipelineRequest<'a> {
    pub source: SourceShape,
    pub declared: Option<&'a SqlType>,
    pub target: &'a ValueType,
    pub format: Option<&'a str>,
    pub converter: Option<&'a str>,
    pub default_text: Option<&'a str>,
    pub null_policy: NullPolicy,
}

impl<'a> PipelineRequest<'a> {
    pub fn new(target: &'a ValueType) -> Self {
        Self {
            source: SourceShape::Text,
            declared: None,
            target,
            format: None,
            converter: None,
            default_text: None,
            null_policy: NullPolicy::Default,
        }
    }

    #[must_use]
    pub fn with_source(mut self, source: SourceShape) -> Self {
        self.source = source;
        self
    }

    #[must_use]
    pub fn with_declared(mut self, declared: Option<&'a SqlType>) -> Self {
        self.declared = declared;
        self
    }

    #[must_use]
    pub fn with_format(mut self, format: Option<&'a str>) -> Self {
        self.format = format;
        self
    }

    #[must_use]
    pub fn with_converter(mut self, converter: Option<&'a str>) -> Self {
        self.converter = converter;
        self
    }

    #[must_use]
    pub fn with_default(mut self, default_text: Option<&'a str>) -> Self {
        self.default_text = default_text;
        self
    }

    #[must_use]
    pub fn with_null_policy(mut self, null_policy: NullPolicy) -> Self {
        self.null_policy = null_policy;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
enum NullHandling {
    Substitute(Value),
    Fail,
}

/// Compiled, immutable cell-to-value pipeline for one column.
#[derive(Debug, Clone)]
pub struct CellPipeline {
    reader: CellReader,
    converter: Converter,
    target: ValueType,
    on_null: NullHandling,
    /// Target kind when values can travel unboxed.
    primitive: Option<ScalarKind>,
}

impl CellPipeline {
    pub fn build(
        registry: &ConversionRegistry,
        ctx: &ParsingContext,
        request: &PipelineRequest<'_>,
    ) -> Result<Self> {
        let target = request.target;
        let target_kind = target.scalar_kind();

        let (reader, converter) = if let Some(name) = request.converter {
            (CellReader::Text, registry.resolve_named(name, target)?)
        } else if let (Some(meta), SourceShape::Native, None) =
            (target.enum_meta(), request.source, request.declared)
        {
            // Untyped driver columns resolve per value: names or ordinals.
            (CellReader::Raw, registry.resolve_enum(None, meta)?)
        } else {
            let source_kind = match (request.source, request.declared) {
                (SourceShape::Native, Some(declared)) => declared
                    .source_kind()
                    .ok_or_else(|| ConvertError::UnsupportedSource(declared.clone()))?,
                // Text cells are parsed straight into the declared representation
                // when it is not text, so narrowing follows the declared width.
                (SourceShape::Text, Some(declared)) => match declared.source_kind() {
                    Some(kind) if kind != ScalarKind::Text => kind,
                    _ => target_kind.unwrap_or(ScalarKind::Text),
                },
                // Drivers hand out no byte or short values of their own.
                (SourceShape::Native, None) => match target_kind {
                    Some(kind @ (ScalarKind::I8 | ScalarKind::I16)) => {
                        return Err(ConvertError::UndeclaredSource(kind));
                    }
                    kind => kind.unwrap_or(ScalarKind::Text),
                },
                (SourceShape::Text, None) => target_kind.unwrap_or(ScalarKind::Text),
            };
            let reader = CellReader::for_kind(source_kind, request.format)?;
            let converter = registry.resolve_type(source_kind, request.declared, target)?;
            (reader, converter)
        };

        let on_null = match request.null_policy {
            NullPolicy::Error => NullHandling::Fail,
            NullPolicy::Default if target.is_unboxed_primitive() => {
                NullHandling::Substitute(target.default_value())
            }
            NullPolicy::Default => NullHandling::Substitute(Value::Null),
        };

        let mut pipeline = Self {
            reader,
            converter,
            target: target.clone(),
            on_null,
            primitive: target_kind.filter(|_| target.is_unboxed_primitive()),
        };

        if let Some(raw) = request.default_text {
            let value = pipeline
                .read_present(&Cell::Text(raw), ctx)
                .map_err(|err| ConvertError::InvalidDefault {
                    value: raw.to_string(),
                    target: target.to_string(),
                    message: err.to_string(),
                })?;
            pipeline.on_null = NullHandling::Substitute(value);
        }
        Ok(pipeline)
    }

    pub fn reader(&self) -> &CellReader {
        &self.reader
    }

    pub fn converter(&self) -> &Converter {
        &self.converter
    }

    pub fn target(&self) -> &ValueType {
        &self.target
    }

    /// Target kind when [`CellPipeline::read_primitive`] applies.
    pub fn primitive_kind(&self) -> Option<ScalarKind> {
        self.primitive
    }

    /// Value used for a null cell.
    pub fn null_value(&self) -> std::result::Result<Value, CellError> {
        match &self.on_null {
            NullHandling::Substitute(value) => Ok(value.clone()),
            NullHandling::Fail => Err(CellError::Null),
        }
    }

    /// Reads and converts one cell.
    pub fn read(&self, cell: &Cell<'_>, ctx: &ParsingContext) -> std::result::Result<Value, CellError> {
        if cell.is_null() {
            return self.null_value();
        }
        self.read_present(cell, ctx)
    }

    /// Unboxed read for primitive targets.
    pub fn read_primitive(
        &self,
        cell: &Cell<'_>,
        ctx: &ParsingContext,
    ) -> std::result::Result<Primitive, CellError> {
        let Some(kind) = self.primitive else {
            return Err(CellError::UnexpectedCell {
                expected: self.reader.name(),
                found: cell.type_name(),
            });
        };
        if self.converter.is_identity()
            && !cell.is_null()
            && let Some(value) = self.reader.read_primitive(cell, ctx)?
        {
            return Ok(value);
        }
        let value = self.read(cell, ctx)?;
        value.as_primitive().ok_or_else(|| CellError::Conversion {
            from: "value",
            to: kind,
            message: "conversion did not produce a primitive".to_string(),
        })
    }

    fn read_present(
        &self,
        cell: &Cell<'_>,
        ctx: &ParsingContext,
    ) -> std::result::Result<Value, CellError> {
        let value = self.reader.read(cell, ctx)?;
        self.converter.convert(value, ctx)
    }

    pub fn describe(&self) -> String {
        format!(
            "{} | {} -> {}",
            self.reader.name(),
            self.converter.describe(),
            self.target
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(request: &PipelineRequest<'_>) -> Result<CellPipeline> {
        CellPipeline::build(&ConversionRegistry::default(), &ParsingContext::default(), request)
    }

    #[test]
    fn declared_bigint_text_cell_truncates_into_short() {
        let target = ValueType::scalar(ScalarKind::I16);
        let declared = SqlType::BigInt;
        let pipeline = build(&PipelineRequest::new(&target).with_declared(Some(&declared))).unwrap();
        assert_eq!(pipeline.reader().kind(), Some(ScalarKind::I64));
        let ctx = ParsingContext::default();
        assert_eq!(
            pipeline.read(&Cell::Text("65541"), &ctx).unwrap(),
            Value::I16(5)
        );
        assert_eq!(
            pipeline.read_primitive(&Cell::Text("65541"), &ctx).unwrap(),
            Primitive::I16(5)
        );
    }

    #[test]
    fn native_source_uses_declared_kind() {
        let target = ValueType::scalar(ScalarKind::I32);
        let declared = SqlType::BigInt;
        let pipeline = build(
            &PipelineRequest::new(&target)
                .with_source(SourceShape::Native)
                .with_declared(Some(&declared)),
        )
        .unwrap();
        let ctx = ParsingContext::default();
        assert_eq!(pipeline.read(&Cell::I64(-3), &ctx).unwrap(), Value::I32(-3));
    }

    #[test]
    fn native_unknown_declared_type_fails_at_build() {
        let target = ValueType::scalar(ScalarKind::I32);
        let declared = SqlType::Other("uuid".to_string());
        let err = build(
            &PipelineRequest::new(&target)
                .with_source(SourceShape::Native)
                .with_declared(Some(&declared)),
        )
        .unwrap_err();
        assert_eq!(err, ConvertError::UnsupportedSource(declared));
    }

    #[test]
    fn native_narrow_target_needs_a_declared_type() {
        for kind in [ScalarKind::I8, ScalarKind::I16] {
            let target = ValueType::scalar(kind);
            let err = build(&PipelineRequest::new(&target).with_source(SourceShape::Native))
                .unwrap_err();
            assert_eq!(err, ConvertError::UndeclaredSource(kind));
        }
        let wide = ValueType::scalar(ScalarKind::I32);
        assert!(build(&PipelineRequest::new(&wide).with_source(SourceShape::Native)).is_ok());
        let small = ValueType::scalar(ScalarKind::I16);
        assert!(build(&PipelineRequest::new(&small)).is_ok());
    }

    #[test]
    fn null_policy_default_and_error() {
        let ctx = ParsingContext::default();
        let int = ValueType::scalar(ScalarKind::I32);
        let boxed = ValueType::optional(ValueType::scalar(ScalarKind::I32));

        let zeroing = build(&PipelineRequest::new(&int)).unwrap();
        assert_eq!(zeroing.read(&Cell::Null, &ctx).unwrap(), Value::I32(0));
        assert_eq!(zeroing.read_primitive(&Cell::Text(""), &ctx).unwrap(), Primitive::I32(0));

        let nullable = build(&PipelineRequest::new(&boxed)).unwrap();
        assert_eq!(nullable.read(&Cell::Text(""), &ctx).unwrap(), Value::Null);
        assert_eq!(nullable.primitive_kind(), None);

        let strict = build(&PipelineRequest::new(&boxed).with_null_policy(NullPolicy::Error)).unwrap();
        assert_eq!(strict.read(&Cell::Null, &ctx), Err(CellError::Null));
    }

    #[test]
    fn column_default_replaces_null() {
        let ctx = ParsingContext::default();
        let target = ValueType::scalar(ScalarKind::Text);
        let pipeline = build(&PipelineRequest::new(&target).with_default(Some("n/a"))).unwrap();
        assert_eq!(pipeline.read(&Cell::Null, &ctx).unwrap(), Value::text("n/a"));

        let int = ValueType::scalar(ScalarKind::I32);
        assert!(matches!(
            build(&PipelineRequest::new(&int).with_default(Some("abc"))),
            Err(ConvertError::InvalidDefault { .. })
        ));
    }

    #[test]
    fn format_override_applies_to_dates() {
        let ctx = ParsingContext::default();
        let target = ValueType::scalar(ScalarKind::Date);
        let pipeline = build(&PipelineRequest::new(&target).with_format(Some("%d.%m.%Y"))).unwrap();
        let value = pipeline.read(&Cell::Text("01.02.2023"), &ctx).unwrap();
        assert_eq!(
            value,
            Value::Date(chrono::NaiveDate::from_ymd_opt(2023, 2, 1).unwrap())
        );
    }

    #[test]
    fn enum_targets_read_names_and_ordinals() {
        let ctx = ParsingContext::default();
        let kind = rowmap_model::EnumMeta::new("Kind", ["type1", "type2", "type3"]).unwrap();
        let target = ValueType::enumeration(kind);
        let integer = SqlType::Integer;
        let varchar = SqlType::Varchar;
        let driver = |declared| {
            build(
                &PipelineRequest::new(&target)
                    .with_source(SourceShape::Native)
                    .with_declared(declared),
            )
            .unwrap()
        };

        let cases = [
            (driver(Some(&integer)), Cell::I32(2), "type3"),
            (driver(Some(&varchar)), Cell::Text("type2"), "type2"),
            (driver(None), Cell::I32(2), "type3"),
            (driver(None), Cell::Text("type2"), "type2"),
        ];
        for (pipeline, cell, expected) in cases {
            assert_eq!(pipeline.read(&cell, &ctx).unwrap(), Value::text(expected));
        }
        assert!(matches!(driver(None).reader(), CellReader::Raw));

        let text = build(&PipelineRequest::new(&target).with_default(Some("TYPE1"))).unwrap();
        assert_eq!(text.read(&Cell::Text("1"), &ctx).unwrap(), Value::text("type2"));
        assert_eq!(text.read(&Cell::Text(""), &ctx).unwrap(), Value::text("type1"));
        assert!(matches!(
            text.read(&Cell::Text("type9"), &ctx),
            Err(CellError::UnknownVariant { .. })
        ));
    }
}
