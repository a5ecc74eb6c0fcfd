//! Cell readers: raw cell to typed value.
//!
//! A [`CellReader`] is chosen once per column when a pipeline is compiled.
//! Readers hold no per-row state; they are pure functions of the cell and the
//! shared [`ParsingContext`]. Primitive kinds are read through
//! [`CellReader::read_primitive`], which never allocates.

use std::sync::Arc;

use chrono::format::{Item, StrftimeItems};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use rowmap_model::{Primitive, ScalarKind, Value};

use crate::cell::Cell;
use crate::context::ParsingContext;
use crate::error::{CellError, ConvertError};

#[derive(Debug, Clone, PartialEq)]
pub enum CellReader {
    Text,
    /// One of the eight primitive kinds.
    Primitive(ScalarKind),
    Date { format: Option<Arc<str>> },
    DateTime { format: Option<Arc<str>> },
    Time { format: Option<Arc<str>> },
    /// Passes the driver's cell through unchanged.
    Raw,
}

impl CellReader {
    /// Reader producing `kind`, with an optional date/time pattern.
    pub fn for_kind(kind: ScalarKind, format: Option<&str>) -> Result<Self, ConvertError> {
        let format = format.map(validate_format).transpose()?;
        Ok(match kind {
            ScalarKind::Text => Self::Text,
            ScalarKind::Date => Self::Date { format },
            ScalarKind::DateTime => Self::DateTime { format },
            ScalarKind::Time => Self::Time { format },
            primitive => Self::Primitive(primitive),
        })
    }

    /// Kind this reader produces; `None` for [`CellReader::Raw`].
    pub fn kind(&self) -> Option<ScalarKind> {
        Some(match self {
            Self::Text => ScalarKind::Text,
            Self::Primitive(kind) => *kind,
            Self::Date { .. } => ScalarKind::Date,
            Self::DateTime { .. } => ScalarKind::DateTime,
            Self::Time { .. } => ScalarKind::Time,
            Self::Raw => return None,
        })
    }

    pub fn name(&self) -> &'static str {
        self.kind().map_or("raw", ScalarKind::as_str)
    }

    /// Reads a primitive without boxing. `Ok(None)` is a null cell.
    pub fn read_primitive(
        &self,
        cell: &Cell<'_>,
        ctx: &ParsingContext,
    ) -> Result<Option<Primitive>, CellError> {
        let Self::Primitive(kind) = self else {
            return Err(CellError::UnexpectedCell {
                expected: self.name(),
                found: "primitive",
            });
        };
        if cell.is_null() {
            return Ok(None);
        }
        let kind = *kind;
        let value = match (*cell, kind) {
            (Cell::Text(raw), _) => parse_primitive(trimmed(raw, kind, ctx), kind)?,
            (Cell::Bool(v), ScalarKind::Bool) => Primitive::Bool(v),
            (Cell::Char(v), ScalarKind::Char) => Primitive::Char(v),
            (Cell::I8(v), ScalarKind::I8) => Primitive::I8(v),
            (Cell::I16(v), ScalarKind::I16) => Primitive::I16(v),
            (Cell::I32(v), ScalarKind::I32) => Primitive::I32(v),
            (Cell::I64(v), ScalarKind::I64) => Primitive::I64(v),
            (Cell::F32(v), ScalarKind::F32) => Primitive::F32(v),
            (Cell::F64(v), ScalarKind::F64) => Primitive::F64(v),
            (other, expected) => {
                return Err(CellError::UnexpectedCell {
                    expected: expected.as_str(),
                    found: other.type_name(),
                });
            }
        };
        Ok(Some(value))
    }

    /// Reads any kind into a [`Value`]; a null cell is [`Value::Null`].
    pub fn read(&self, cell: &Cell<'_>, ctx: &ParsingContext) -> Result<Value, CellError> {
        if cell.is_null() {
            return Ok(Value::Null);
        }
        match self {
            Self::Raw => Ok(cell.to_value()),
            Self::Primitive(_) => Ok(self
                .read_primitive(cell, ctx)?
                .map_or(Value::Null, Value::from)),
            Self::Text => match *cell {
                Cell::Text(raw) => Ok(Value::Text(raw.to_string())),
                other => Err(CellError::UnexpectedCell {
                    expected: ScalarKind::Text.as_str(),
                    found: other.type_name(),
                }),
            },
            Self::Date { format } => match *cell {
                Cell::Date(v) => Ok(Value::Date(v)),
                Cell::DateTime(v) => Ok(Value::Date(v.date())),
                Cell::Text(raw) => {
                    let pattern = format.as_deref().unwrap_or(&ctx.date_format);
                    parse_date(raw.trim(), pattern).map(Value::Date)
                }
                other => Err(CellError::UnexpectedCell {
                    expected: ScalarKind::Date.as_str(),
                    found: other.type_name(),
                }),
            },
            Self::DateTime { format } => match *cell {
                Cell::DateTime(v) => Ok(Value::DateTime(v)),
                Cell::Date(v) => Ok(Value::DateTime(v.and_time(chrono::NaiveTime::MIN))),
                Cell::Text(raw) => {
                    parse_datetime(raw.trim(), format.as_deref(), ctx).map(Value::DateTime)
                }
                other => Err(CellError::UnexpectedCell {
                    expected: ScalarKind::DateTime.as_str(),
                    found: other.type_name(),
                }),
            },
            Self::Time { format } => match *cell {
                Cell::Time(v) => Ok(Value::Time(v)),
                Cell::DateTime(v) => Ok(Value::Time(v.time())),
                Cell::Text(raw) => {
                    let pattern = format.as_deref().unwrap_or(&ctx.time_format);
                    parse_time(raw.trim(), pattern).map(Value::Time)
                }
                other => Err(CellError::UnexpectedCell {
                    expected: ScalarKind::Time.as_str(),
                    found: other.type_name(),
                }),
            },
        }
    }
}

/// Whitespace is data for characters; other primitives follow the context.
pub(crate) fn trimmed<'s>(raw: &'s str, kind: ScalarKind, ctx: &ParsingContext) -> &'s str {
    if ctx.trim_numbers && kind != ScalarKind::Char {
        raw.trim()
    } else {
        raw
    }
}

fn validate_format(pattern: &str) -> Result<Arc<str>, ConvertError> {
    if pattern.is_empty() || StrftimeItems::new(pattern).any(|item| matches!(item, Item::Error)) {
        return Err(ConvertError::InvalidFormat(pattern.to_string()));
    }
    Ok(Arc::from(pattern))
}

fn parse_error(kind: ScalarKind, raw: &str) -> CellError {
    CellError::Parse {
        kind,
        value: raw.to_string(),
    }
}

/// Parses text into a primitive of `kind`. Callers trim numbers first.
pub fn parse_primitive(raw: &str, kind: ScalarKind) -> Result<Primitive, CellError> {
    let err = || parse_error(kind, raw);
    Ok(match kind {
        ScalarKind::Bool => Primitive::Bool(parse_bool(raw).ok_or_else(err)?),
        ScalarKind::Char => Primitive::Char(raw.chars().next().ok_or_else(err)?),
        ScalarKind::I8 => Primitive::I8(raw.parse().map_err(|_| err())?),
        ScalarKind::I16 => Primitive::I16(raw.parse().map_err(|_| err())?),
        ScalarKind::I32 => Primitive::I32(raw.parse().map_err(|_| err())?),
        ScalarKind::I64 => Primitive::I64(raw.parse().map_err(|_| err())?),
        ScalarKind::F32 => Primitive::F32(raw.parse().map_err(|_| err())?),
        ScalarKind::F64 => Primitive::F64(raw.parse().map_err(|_| err())?),
        ScalarKind::Text | ScalarKind::Date | ScalarKind::DateTime | ScalarKind::Time => {
            return Err(err());
        }
    })
}

/// Boolean tokens: `true/false`, `t/f`, `yes/no`, `y/n`, `1/0` (any case).
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "t" | "yes" | "y" | "1" => Some(true),
        "false" | "f" | "no" | "n" | "0" => Some(false),
        _ => None,
    }
}

pub fn parse_date(raw: &str, pattern: &str) -> Result<NaiveDate, CellError> {
    NaiveDate::parse_from_str(raw, pattern).map_err(|_| parse_error(ScalarKind::Date, raw))
}

pub fn parse_time(raw: &str, pattern: &str) -> Result<NaiveTime, CellError> {
    NaiveTime::parse_from_str(raw, pattern).map_err(|_| parse_error(ScalarKind::Time, raw))
}

pub fn parse_datetime(
    raw: &str,
    pattern: Option<&str>,
    ctx: &ParsingContext,
) -> Result<NaiveDateTime, CellError> {
    let parsed = match pattern {
        Some(pattern) => NaiveDateTime::parse_from_str(raw, pattern).ok(),
        None => ctx
            .datetime_formats
            .iter()
            .find_map(|pattern| NaiveDateTime::parse_from_str(raw, pattern).ok()),
    };
    parsed.ok_or_else(|| parse_error(ScalarKind::DateTime, raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> ParsingContext {
        ParsingContext::default()
    }

    #[test]
    fn reads_primitives_from_text_without_boxing() {
        let reader = CellReader::for_kind(ScalarKind::I32, None).unwrap();
        assert_eq!(
            reader.read_primitive(&Cell::Text(" 42 "), &ctx()).unwrap(),
            Some(Primitive::I32(42))
        );
        assert_eq!(reader.read_primitive(&Cell::Text(""), &ctx()).unwrap(), None);
        assert!(matches!(
            reader.read_primitive(&Cell::Text("4x"), &ctx()),
            Err(CellError::Parse { .. })
        ));
    }

    #[test]
    fn native_cells_must_match_reader_kind() {
        let reader = CellReader::for_kind(ScalarKind::I64, None).unwrap();
        assert_eq!(
            reader.read(&Cell::I64(9), &ctx()).unwrap(),
            Value::I64(9)
        );
        assert!(matches!(
            reader.read(&Cell::Bool(true), &ctx()),
            Err(CellError::UnexpectedCell { found: "bool", .. })
        ));
    }

    #[test]
    fn char_reader_takes_first_character() {
        let reader = CellReader::for_kind(ScalarKind::Char, None).unwrap();
        assert_eq!(
            reader.read(&Cell::Text("xyz"), &ctx()).unwrap(),
            Value::Char('x')
        );
        assert_eq!(reader.read(&Cell::Text(""), &ctx()).unwrap(), Value::Null);
    }

    #[test]
    fn char_whitespace_is_kept() {
        let reader = CellReader::for_kind(ScalarKind::Char, None).unwrap();
        assert_eq!(reader.read(&Cell::Text(" "), &ctx()).unwrap(), Value::Char(' '));
        assert_eq!(
            reader.read_primitive(&Cell::Text("\t"), &ctx()).unwrap(),
            Some(Primitive::Char('\t'))
        );
    }

    #[test]
    fn date_reader_uses_column_format_then_context() {
        let custom = CellReader::for_kind(ScalarKind::Date, Some("%d/%m/%Y")).unwrap();
        assert_eq!(
            custom.read(&Cell::Text("02/03/2024"), &ctx()).unwrap(),
            Value::Date(NaiveDate::from_ymd_opt(2024, 3, 2).unwrap())
        );
        let default = CellReader::for_kind(ScalarKind::Date, None).unwrap();
        assert_eq!(
            default.read(&Cell::Text("2024-03-02"), &ctx()).unwrap(),
            Value::Date(NaiveDate::from_ymd_opt(2024, 3, 2).unwrap())
        );
    }

    #[test]
    fn datetime_reader_tries_context_formats() {
        let reader = CellReader::for_kind(ScalarKind::DateTime, None).unwrap();
        let value = reader.read(&Cell::Text("2024-03-02 10:11:12"), &ctx()).unwrap();
        let Value::DateTime(ts) = value else {
            panic!("expected timestamp, got {value:?}");
        };
        assert_eq!(ts.to_string(), "2024-03-02 10:11:12");
    }

    #[test]
    fn time_reader_parses_text_and_narrows_timestamps() {
        let reader = CellReader::for_kind(ScalarKind::Time, None).unwrap();
        let noon = NaiveTime::from_hms_opt(12, 30, 5).unwrap();
        assert_eq!(reader.read(&Cell::Text(" 12:30:05 "), &ctx()).unwrap(), Value::Time(noon));
        assert_eq!(
            reader.read(&Cell::Text("12:30:05.250"), &ctx()).unwrap(),
            Value::Time(NaiveTime::from_hms_milli_opt(12, 30, 5, 250).unwrap())
        );
        let stamp = NaiveDate::from_ymd_opt(2024, 3, 2).unwrap().and_time(noon);
        assert_eq!(reader.read(&Cell::DateTime(stamp), &ctx()).unwrap(), Value::Time(noon));
        assert!(matches!(
            reader.read(&Cell::Text("25:00:00"), &ctx()),
            Err(CellError::Parse { kind: ScalarKind::Time, .. })
        ));

        let custom = CellReader::for_kind(ScalarKind::Time, Some("%I:%M %p")).unwrap();
        assert_eq!(
            custom.read(&Cell::Text("07:15 PM"), &ctx()).unwrap(),
            Value::Time(NaiveTime::from_hms_opt(19, 15, 0).unwrap())
        );
    }

    #[test]
    fn invalid_format_is_rejected_at_build_time() {
        assert!(matches!(
            CellReader::for_kind(ScalarKind::Date, Some("%Q")),
            Err(ConvertError::InvalidFormat(_))
        ));
    }

    #[test]
    fn bool_tokens() {
        assert_eq!(parse_bool("Yes"), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }
}
