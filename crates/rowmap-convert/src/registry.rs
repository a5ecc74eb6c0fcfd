//! The type conversion chain.
//!
//! [`ConversionRegistry::resolve`] picks a [`Converter`] for a
//! `(source kind, declared type, target kind)` triple, trying in order:
//!
//! 1. identity when the kinds already match
//! 2. a registered direct converter for the exact pair
//! 3. a two-step chain through an intermediate kind
//! 4. a single-argument constructor on an object target ([`ConversionRegistry::resolve_type`])
//!
//! Numeric narrowing is a silent two's-complement truncation. A declared
//! source type may forbid some targets outright; those fail here, at
//! pipeline build time, never per row.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, NaiveTime};
use tracing::trace;

use rowmap_model::{EnumMeta, Record, ScalarKind, SqlType, Value, ValueType};

use crate::context::ParsingContext;
use crate::error::{CellError, ConvertError, Result};
use crate::reader::{parse_date, parse_datetime, parse_primitive, parse_time, trimmed};

/// Conversion function for non-null values.
pub type ConvertFn = Arc<dyn Fn(Value, &ParsingContext) -> std::result::Result<Value, CellError> + Send + Sync>;

/// A resolved conversion, possibly the identity.
#[derive(Clone)]
pub enum Converter {
    Identity,
    Function { label: Arc<str>, f: ConvertFn },
    Chain(Arc<[Converter]>),
}

impl Converter {
    pub fn function(label: impl Into<Arc<str>>, f: ConvertFn) -> Self {
        Self::Function {
            label: label.into(),
            f,
        }
    }

    pub fn is_identity(&self) -> bool {
        matches!(self, Self::Identity)
    }

    /// Converts a non-null value. Null passes through untouched.
    pub fn convert(
        &self,
        value: Value,
        ctx: &ParsingContext,
    ) -> std::result::Result<Value, CellError> {
        if value.is_null() {
            return Ok(value);
        }
        match self {
            Self::Identity => Ok(value),
            Self::Function { f, .. } => f(value, ctx),
            Self::Chain(steps) => steps
                .iter()
                .try_fold(value, |acc, step| step.convert(acc, ctx)),
        }
    }

    /// Short description, e.g. `text->i64->i16`.
    pub fn describe(&self) -> String {
        match self {
            Self::Identity => "identity".to_string(),
            Self::Function { label, .. } => label.to_string(),
            Self::Chain(steps) => steps
                .iter()
                .map(Converter::describe)
                .collect::<Vec<_>>()
                .join(" | "),
        }
    }
}

impl fmt::Debug for Converter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Converter({})", self.describe())
    }
}

/// Converter registered under a name, selected per column.
#[derive(Clone)]
struct NamedConverter {
    output: ScalarKind,
    f: ConvertFn,
}

/// Registry of direct and named converters plus declared-type restrictions.
#[derive(Clone)]
pub struct ConversionRegistry {
    direct: HashMap<(ScalarKind, ScalarKind), ConvertFn>,
    named: HashMap<String, NamedConverter>,
    disallowed: HashSet<(SqlType, ScalarKind)>,
}

impl fmt::Debug for ConversionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionRegistry")
            .field("direct", &self.direct.len())
            .field("named", &self.named.keys().collect::<Vec<_>>())
            .field("disallowed", &self.disallowed.len())
            .finish()
    }
}

impl Default for ConversionRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register_builtin();
        registry
    }
}

impl ConversionRegistry {
    /// Registry without any converter; only identity resolves.
    pub fn empty() -> Self {
        Self {
            direct: HashMap::new(),
            named: HashMap::new(),
            disallowed: HashSet::new(),
        }
    }

    /// Registers (or replaces) the direct converter for `from -> to`.
    pub fn register<F>(&mut self, from: ScalarKind, to: ScalarKind, f: F)
    where
        F: Fn(Value, &ParsingContext) -> std::result::Result<Value, CellError> + Send + Sync + 'static,
    {
        self.direct.insert((from, to), Arc::new(f));
    }

    /// Registers a converter that columns select by name. It receives the
    /// cell read as text and must produce `output`.
    pub fn register_named<F>(&mut self, name: impl Into<String>, output: ScalarKind, f: F)
    where
        F: Fn(Value, &ParsingContext) -> std::result::Result<Value, CellError> + Send + Sync + 'static,
    {
        self.named.insert(
            name.into(),
            NamedConverter {
                output,
                f: Arc::new(f),
            },
        );
    }

    /// Forbids converting columns declared as `declared` into `target`.
    pub fn disallow(&mut self, declared: SqlType, target: ScalarKind) {
        self.disallowed.insert((declared, target));
    }

    pub fn has_direct(&self, from: ScalarKind, to: ScalarKind) -> bool {
        self.direct.contains_key(&(from, to))
    }

    /// Resolves a scalar conversion.
    pub fn resolve(
        &self,
        source: ScalarKind,
        declared: Option<&SqlType>,
        target: ScalarKind,
    ) -> Result<Converter> {
        if let Some(declared) = declared
            && self.disallowed.contains(&(declared.clone(), target))
        {
            return Err(ConvertError::UnsupportedNarrowing {
                declared: declared.clone(),
                to: target,
            });
        }
        if source == target {
            return Ok(Converter::Identity);
        }
        if let Some(f) = self.direct.get(&(source, target)) {
            return Ok(Converter::function(format!("{source}->{target}"), Arc::clone(f)));
        }
        for mid in ScalarKind::ALL {
            if mid == source || mid == target {
                continue;
            }
            if let (Some(first), Some(second)) = (
                self.direct.get(&(source, mid)),
                self.direct.get(&(mid, target)),
            ) {
                trace!(%source, %mid, %target, "conversion resolved through intermediate");
                return Ok(Converter::Chain(Arc::from(vec![
                    Converter::function(format!("{source}->{mid}"), Arc::clone(first)),
                    Converter::function(format!("{mid}->{target}"), Arc::clone(second)),
                ])));
            }
        }
        Err(ConvertError::UnsupportedConversion {
            from: source.to_string(),
            to: target.to_string(),
        })
    }

    /// Resolves a conversion into a property type, including the factory
    /// step for objects constructible from a single value.
    pub fn resolve_type(
        &self,
        source: ScalarKind,
        declared: Option<&SqlType>,
        target: &ValueType,
    ) -> Result<Converter> {
        if let Some(kind) = target.scalar_kind() {
            return self.resolve(source, declared, kind);
        }
        if let Some(meta) = target.enum_meta() {
            return self.resolve_enum(Some(source), meta);
        }
        let unsupported = || ConvertError::UnsupportedConversion {
            from: source.to_string(),
            to: target.to_string(),
        };
        let meta = target.object_meta().ok_or_else(unsupported)?;
        let [arg_index] = meta.constructor_args() else {
            return Err(unsupported());
        };
        let arg_index = *arg_index;
        let arg_kind = meta
            .property(arg_index)
            .and_then(|p| p.value_type().scalar_kind())
            .ok_or_else(unsupported)?;
        let inner = self.resolve(source, declared, arg_kind)?;
        let meta = Arc::clone(meta);
        let label = format!("{}({})", meta.name(), inner.describe());
        Ok(Converter::function(
            label,
            Arc::new(move |value, ctx| {
                let arg = inner.convert(value, ctx)?;
                let mut record = Record::new(Arc::clone(&meta));
                record.set_index(arg_index, arg);
                Ok(Value::Record(record))
            }),
        ))
    }

    /// Resolves enum variants by name from text and by ordinal from integers.
    ///
    /// A `None` source accepts whatever the driver hands out and decides per
    /// value.
    pub fn resolve_enum(
        &self,
        source: Option<ScalarKind>,
        meta: &Arc<EnumMeta>,
    ) -> Result<Converter> {
        if let Some(kind) = source
            && kind != ScalarKind::Text
            && !kind.is_integer()
        {
            return Err(ConvertError::UnsupportedConversion {
                from: kind.to_string(),
                to: meta.name().to_string(),
            });
        }
        let label = format!("{}->{}", source.map_or("raw", ScalarKind::as_str), meta.name());
        let meta = Arc::clone(meta);
        Ok(Converter::function(
            label,
            Arc::new(move |value, ctx| variant_of(&meta, &value, ctx)),
        ))
    }

    /// Resolves a named converter and checks its output against `target`.
    pub fn resolve_named(&self, name: &str, target: &ValueType) -> Result<Converter> {
        let named = self
            .named
            .get(name)
            .ok_or_else(|| ConvertError::UnknownConverter(name.to_string()))?;
        let head = Converter::function(name.to_string(), Arc::clone(&named.f));
        if let Some(meta) = target.enum_meta() {
            let tail = self.resolve_enum(Some(named.output), meta).map_err(|_| {
                ConvertError::ConverterMismatch {
                    name: name.to_string(),
                    produces: named.output,
                    target: target.to_string(),
                }
            })?;
            return Ok(Converter::Chain(Arc::from(vec![head, tail])));
        }
        let Some(target_kind) = target.scalar_kind() else {
            return Err(ConvertError::ConverterMismatch {
                name: name.to_string(),
                produces: named.output,
                target: target.to_string(),
            });
        };
        if named.output == target_kind {
            return Ok(head);
        }
        let tail = self
            .resolve(named.output, None, target_kind)
            .map_err(|_| ConvertError::ConverterMismatch {
                name: name.to_string(),
                produces: named.output,
                target: target.to_string(),
            })?;
        Ok(Converter::Chain(Arc::from(vec![head, tail])))
    }

    fn register_builtin(&mut self) {
        use ScalarKind::{
            Bool, Char, Date, DateTime as Timestamp, F32, F64, I8, I16, I32, I64, Text, Time,
        };

        let numeric = [I8, I16, I32, I64, F32, F64];
        for from in numeric {
            for to in numeric {
                if from != to {
                    self.register(from, to, move |v, _| cast_numeric(&v, to));
                }
            }
        }
        for int in [I8, I16, I32, I64] {
            self.register(Bool, int, move |v, _| cast_numeric(&v, int));
            self.register(int, Bool, |v, _| cast_numeric(&v, Bool));
            self.register(Char, int, move |v, _| cast_numeric(&v, int));
            self.register(int, Char, |v, _| cast_numeric(&v, Char));
        }

        for kind in ScalarKind::ALL {
            if kind != Text {
                self.register(kind, Text, |v, ctx| Ok(Value::Text(format_scalar(&v, None, ctx))));
            }
        }
        for kind in [Bool, Char, I8, I16, I32, I64, F32, F64] {
            self.register(Text, kind, move |v, ctx| {
                parse_primitive(trimmed(text_of(&v, kind)?, kind, ctx), kind).map(Value::from)
            });
        }
        self.register(Text, Date, |v, ctx| {
            parse_date(text_of(&v, Date)?.trim(), &ctx.date_format).map(Value::Date)
        });
        self.register(Text, Timestamp, |v, ctx| {
            parse_datetime(text_of(&v, Timestamp)?.trim(), None, ctx).map(Value::DateTime)
        });

        self.register(Text, Time, |v, ctx| {
            parse_time(text_of(&v, Time)?.trim(), &ctx.time_format).map(Value::Time)
        });
        self.register(Timestamp, Time, |v, _| match v {
            Value::DateTime(ts) => Ok(Value::Time(ts.time())),
            other => Err(mismatch(&other, Time)),
        });

        self.register(Date, Timestamp, |v, _| match v {
            Value::Date(d) => Ok(Value::DateTime(d.and_time(NaiveTime::MIN))),
            other => Err(mismatch(&other, Timestamp)),
        });
        self.register(Timestamp, Date, |v, _| match v {
            Value::DateTime(ts) => Ok(Value::Date(ts.date())),
            other => Err(mismatch(&other, Date)),
        });
        // Epoch milliseconds.
        self.register(I64, Timestamp, |v, _| match v {
            Value::I64(ms) => DateTime::from_timestamp_millis(ms)
                .map(|ts| Value::DateTime(ts.naive_utc()))
                .ok_or_else(|| CellError::Conversion {
                    from: "i64",
                    to: Timestamp,
                    message: format!("{ms} is out of range"),
                }),
            other => Err(mismatch(&other, Timestamp)),
        });
        self.register(Timestamp, I64, |v, _| match v {
            Value::DateTime(ts) => Ok(Value::I64(ts.and_utc().timestamp_millis())),
            other => Err(mismatch(&other, I64)),
        });

        for declared in [SqlType::Date, SqlType::Timestamp, SqlType::Time] {
            for target in [Bool, Char, I8, I16, I32] {
                self.disallow(declared.clone(), target);
            }
        }
        for declared in [SqlType::Real, SqlType::Double, SqlType::Numeric] {
            self.disallow(declared, Char);
        }
        for target in [Date, Timestamp, Time] {
            self.disallow(SqlType::Boolean, target);
        }
    }
}

fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::List(_) => "list",
        Value::Record(_) => "record",
        other => other.scalar_kind().map_or("value", ScalarKind::as_str),
    }
}

fn variant_of(
    meta: &EnumMeta,
    value: &Value,
    ctx: &ParsingContext,
) -> std::result::Result<Value, CellError> {
    let found = match value {
        Value::Text(raw) => {
            let raw = raw.trim();
            meta.by_name(raw)
                .or_else(|| raw.parse().ok().and_then(|i| meta.by_ordinal(i)))
        }
        other => other.as_i64().and_then(|i| meta.by_ordinal(i)),
    };
    found.map(Value::text).ok_or_else(|| CellError::UnknownVariant {
        type_name: meta.name().to_string(),
        value: format_scalar(value, None, ctx),
    })
}

fn mismatch(value: &Value, to: ScalarKind) -> CellError {
    CellError::Conversion {
        from: value_type_name(value),
        to,
        message: "unexpected input".to_string(),
    }
}

fn text_of(value: &Value, to: ScalarKind) -> std::result::Result<&str, CellError> {
    value.as_str().ok_or_else(|| mismatch(value, to))
}

enum Number {
    Int(i64),
    Float(f64),
}

/// Numeric, boolean and character casts with `as` semantics: integers
/// truncate, floats saturate into integers.
pub fn cast_numeric(value: &Value, to: ScalarKind) -> std::result::Result<Value, CellError> {
    let number = match *value {
        Value::Bool(v) => Number::Int(i64::from(v)),
        Value::Char(v) => Number::Int(i64::from(u32::from(v))),
        Value::I8(v) => Number::Int(i64::from(v)),
        Value::I16(v) => Number::Int(i64::from(v)),
        Value::I32(v) => Number::Int(i64::from(v)),
        Value::I64(v) => Number::Int(v),
        Value::F32(v) => Number::Float(f64::from(v)),
        Value::F64(v) => Number::Float(v),
        ref other => return Err(mismatch(other, to)),
    };
    Ok(match (to, number) {
        (ScalarKind::I8, Number::Int(v)) => Value::I8(v as i8),
        (ScalarKind::I8, Number::Float(v)) => Value::I8(v as i8),
        (ScalarKind::I16, Number::Int(v)) => Value::I16(v as i16),
        (ScalarKind::I16, Number::Float(v)) => Value::I16(v as i16),
        (ScalarKind::I32, Number::Int(v)) => Value::I32(v as i32),
        (ScalarKind::I32, Number::Float(v)) => Value::I32(v as i32),
        (ScalarKind::I64, Number::Int(v)) => Value::I64(v),
        (ScalarKind::I64, Number::Float(v)) => Value::I64(v as i64),
        (ScalarKind::F32, Number::Int(v)) => Value::F32(v as f32),
        (ScalarKind::F32, Number::Float(v)) => Value::F32(v as f32),
        (ScalarKind::F64, Number::Int(v)) => Value::F64(v as f64),
        (ScalarKind::F64, Number::Float(v)) => Value::F64(v),
        (ScalarKind::Bool, Number::Int(v)) => Value::Bool(v != 0),
        (ScalarKind::Bool, Number::Float(v)) => Value::Bool(v != 0.0),
        (ScalarKind::Char, Number::Int(v)) => u32::try_from(v)
            .ok()
            .and_then(char::from_u32)
            .map(Value::Char)
            .ok_or_else(|| CellError::Conversion {
                from: value_type_name(value),
                to,
                message: format!("{v} is not a valid character"),
            })?,
        (to, _) => return Err(mismatch(value, to)),
    })
}

/// Text form of a scalar value; `format` applies to dates and timestamps.
pub fn format_scalar(value: &Value, format: Option<&str>, ctx: &ParsingContext) -> String {
    match value {
        Value::Null | Value::List(_) | Value::Record(_) => String::new(),
        Value::Bool(v) => v.to_string(),
        Value::Char(v) => v.to_string(),
        Value::I8(v) => v.to_string(),
        Value::I16(v) => v.to_string(),
        Value::I32(v) => v.to_string(),
        Value::I64(v) => v.to_string(),
        Value::F32(v) => v.to_string(),
        Value::F64(v) => v.to_string(),
        Value::Text(v) => v.clone(),
        Value::Date(d) => d
            .format(format.unwrap_or(&ctx.date_format))
            .to_string(),
        Value::DateTime(ts) => ts
            .format(format.unwrap_or_else(|| ctx.datetime_output_format()))
            .to_string(),
        Value::Time(t) => t.format(format.unwrap_or(&ctx.time_format)).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rowmap_model::TypeMeta;

    fn ctx() -> ParsingContext {
        ParsingContext::default()
    }

    #[test]
    fn identity_when_kinds_match() {
        let registry = ConversionRegistry::default();
        let converter = registry.resolve(ScalarKind::I32, None, ScalarKind::I32).unwrap();
        assert!(converter.is_identity());
    }

    #[test]
    fn bigint_into_short_truncates() {
        let registry = ConversionRegistry::default();
        let converter = registry
            .resolve(ScalarKind::I64, Some(&SqlType::BigInt), ScalarKind::I16)
            .unwrap();
        let value = converter.convert(Value::I64(65536 + 5), &ctx()).unwrap();
        assert_eq!(value, Value::I16(5));
        let negative = converter.convert(Value::I64(-1), &ctx()).unwrap();
        assert_eq!(negative, Value::I16(-1));
    }

    #[test]
    fn declared_type_can_forbid_narrowing() {
        let registry = ConversionRegistry::default();
        let err = registry
            .resolve(ScalarKind::DateTime, Some(&SqlType::Timestamp), ScalarKind::I16)
            .unwrap_err();
        assert_eq!(
            err,
            ConvertError::UnsupportedNarrowing {
                declared: SqlType::Timestamp,
                to: ScalarKind::I16
            }
        );
    }

    #[test]
    fn chains_through_an_intermediate_kind() {
        let registry = ConversionRegistry::default();
        let converter = registry.resolve(ScalarKind::Date, None, ScalarKind::I64).unwrap();
        assert!(matches!(converter, Converter::Chain(_)));
        let date = chrono::NaiveDate::from_ymd_opt(1970, 1, 2).unwrap();
        assert_eq!(
            converter.convert(Value::Date(date), &ctx()).unwrap(),
            Value::I64(86_400_000)
        );
    }

    #[test]
    fn missing_conversion_is_reported() {
        let registry = ConversionRegistry::empty();
        assert!(matches!(
            registry.resolve(ScalarKind::Text, None, ScalarKind::I32),
            Err(ConvertError::UnsupportedConversion { .. })
        ));
    }

    #[test]
    fn factory_on_single_argument_object() {
        let email = TypeMeta::builder("Email")
            .constructor_arg("address", ValueType::scalar(ScalarKind::Text))
            .build()
            .unwrap();
        let registry = ConversionRegistry::default();
        let converter = registry
            .resolve_type(ScalarKind::Text, None, &ValueType::object(email))
            .unwrap();
        let value = converter.convert(Value::text("a@b.c"), &ctx()).unwrap();
        let record = value.as_record().unwrap();
        assert_eq!(record.type_name(), "Email");
        assert_eq!(record.get("address"), Some(&Value::text("a@b.c")));
    }

    #[test]
    fn named_converter_is_chained_into_target() {
        let mut registry = ConversionRegistry::default();
        registry.register_named("cents", ScalarKind::I64, |v, _| {
            let raw = v.as_str().unwrap_or_default().replace('.', "");
            raw.parse::<i64>().map(Value::I64).map_err(|_| CellError::Parse {
                kind: ScalarKind::I64,
                value: raw,
            })
        });
        let converter = registry
            .resolve_named("cents", &ValueType::scalar(ScalarKind::I32))
            .unwrap();
        assert_eq!(
            converter.convert(Value::text("12.34"), &ctx()).unwrap(),
            Value::I32(1234)
        );
        assert!(matches!(
            registry.resolve_named("nope", &ValueType::scalar(ScalarKind::I32)),
            Err(ConvertError::UnknownConverter(_))
        ));
    }

    #[test]
    fn text_to_char_keeps_spaces() {
        let registry = ConversionRegistry::default();
        let converter = registry.resolve(ScalarKind::Text, None, ScalarKind::Char).unwrap();
        assert_eq!(converter.convert(Value::text(" "), &ctx()).unwrap(), Value::Char(' '));
        let numbers = registry.resolve(ScalarKind::Text, None, ScalarKind::I32).unwrap();
        assert_eq!(numbers.convert(Value::text(" 7 "), &ctx()).unwrap(), Value::I32(7));
    }

    #[test]
    fn enum_variants_by_name_and_ordinal() {
        let status = EnumMeta::new("Status", ["open", "closed"]).unwrap();
        let target = ValueType::enumeration(Arc::clone(&status));
        let registry = ConversionRegistry::default();

        let names = registry.resolve_type(ScalarKind::Text, None, &target).unwrap();
        assert_eq!(names.convert(Value::text("Closed"), &ctx()).unwrap(), Value::text("closed"));
        assert_eq!(names.convert(Value::text("0"), &ctx()).unwrap(), Value::text("open"));
        assert!(matches!(
            names.convert(Value::text("lost"), &ctx()),
            Err(CellError::UnknownVariant { .. })
        ));

        let ordinals = registry
            .resolve_type(ScalarKind::I32, Some(&SqlType::Integer), &target)
            .unwrap();
        assert_eq!(ordinals.convert(Value::I32(1), &ctx()).unwrap(), Value::text("closed"));
        assert!(ordinals.convert(Value::I32(2), &ctx()).is_err());

        assert!(matches!(
            registry.resolve_type(ScalarKind::Date, None, &target),
            Err(ConvertError::UnsupportedConversion { .. })
        ));
    }

    #[test]
    fn text_and_timestamps_convert_to_time() {
        let registry = ConversionRegistry::default();
        let noon = NaiveTime::from_hms_opt(12, 0, 0).unwrap();
        let text = registry.resolve(ScalarKind::Text, None, ScalarKind::Time).unwrap();
        assert_eq!(text.convert(Value::text("12:00:00"), &ctx()).unwrap(), Value::Time(noon));
        let stamp = chrono::NaiveDate::from_ymd_opt(2024, 5, 1).unwrap().and_time(noon);
        let narrow = registry.resolve(ScalarKind::DateTime, None, ScalarKind::Time).unwrap();
        assert_eq!(narrow.convert(Value::DateTime(stamp), &ctx()).unwrap(), Value::Time(noon));
        assert_eq!(format_scalar(&Value::Time(noon), None, &ctx()), "12:00:00");
        assert_eq!(format_scalar(&Value::Time(noon), Some("%H.%M"), &ctx()), "12.00");
    }

    #[test]
    fn null_passes_through() {
        let registry = ConversionRegistry::default();
        let converter = registry.resolve(ScalarKind::I64, None, ScalarKind::I8).unwrap();
        assert_eq!(converter.convert(Value::Null, &ctx()).unwrap(), Value::Null);
    }
}
