//! Delayed cell setters.
//!
//! One setter per mapped column, owned by a session and reused across rows.
//! `set` replaces the pending value from the current row; `consume_*` takes
//! it out when the owning object is built. Primitive targets stay unboxed
//! until consumed.

use rowmap_convert::{Cell, CellError, CellPipeline, ParsingContext};
use rowmap_model::{Primitive, Value};

#[derive(Debug, Clone, Default, PartialEq)]
enum Pending {
    #[default]
    Empty,
    Primitive(Primitive),
    Value(Value),
}

/// Buffer holding one column's value until its object is built.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DelayedCellSetter {
    pending: Pending,
}

macro_rules! typed_consumer {
    ($(#[$doc:meta])* $name:ident, $variant:ident, $ty:ty) => {
        $(#[$doc])*
        pub fn $name(&mut self) -> Option<$ty> {
            match std::mem::take(&mut self.pending) {
                Pending::Primitive(Primitive::$variant(v)) | Pending::Value(Value::$variant(v)) => {
                    Some(v)
                }
                _ => None,
            }
        }
    };
}

impl DelayedCellSetter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads `cell` through `pipeline` into the buffer.
    ///
    /// On error the buffer is left empty.
    pub fn set(
        &mut self,
        pipeline: &CellPipeline,
        cell: &Cell<'_>,
        ctx: &ParsingContext,
    ) -> Result<(), CellError> {
        self.pending = Pending::Empty;
        self.pending = if pipeline.primitive_kind().is_some() {
            Pending::Primitive(pipeline.read_primitive(cell, ctx)?)
        } else {
            Pending::Value(pipeline.read(cell, ctx)?)
        };
        Ok(())
    }

    pub fn set_value(&mut self, value: Value) {
        self.pending = match value.as_primitive() {
            Some(primitive) => Pending::Primitive(primitive),
            None => Pending::Value(value),
        };
    }

    pub fn is_set(&self) -> bool {
        !matches!(self.pending, Pending::Empty)
    }

    /// True when the pending value is null. Primitives are never null.
    pub fn is_null(&self) -> bool {
        matches!(self.pending, Pending::Value(Value::Null))
    }

    /// The pending value, left in place.
    pub fn peek_value(&self) -> Option<Value> {
        match &self.pending {
            Pending::Empty => None,
            Pending::Primitive(p) => Some(Value::from(*p)),
            Pending::Value(v) => Some(v.clone()),
        }
    }

    /// Takes the pending value. `None` when nothing was set since the last
    /// consume.
    pub fn consume_value(&mut self) -> Option<Value> {
        match std::mem::take(&mut self.pending) {
            Pending::Empty => None,
            Pending::Primitive(p) => Some(Value::from(p)),
            Pending::Value(v) => Some(v),
        }
    }

    pub fn consume_primitive(&mut self) -> Option<Primitive> {
        match std::mem::take(&mut self.pending) {
            Pending::Primitive(p) => Some(p),
            Pending::Value(v) => v.as_primitive(),
            Pending::Empty => None,
        }
    }

    typed_consumer!(consume_bool, Bool, bool);
    typed_consumer!(
        /// Character variant; a text value is not coerced.
        consume_char,
        Char,
        char
    );
    typed_consumer!(consume_i8, I8, i8);
    typed_consumer!(consume_i16, I16, i16);
    typed_consumer!(consume_i32, I32, i32);
    typed_consumer!(consume_i64, I64, i64);
    typed_consumer!(consume_f32, F32, f32);
    typed_consumer!(consume_f64, F64, f64);
}

#[cfg(test)]
mod tests {
    use rowmap_convert::{ConversionRegistry, PipelineRequest};
    use rowmap_model::{ScalarKind, ValueType};

    use super::*;

    fn pipeline(target: &ValueType) -> CellPipeline {
        CellPipeline::build(
            &ConversionRegistry::default(),
            &ParsingContext::default(),
            &PipelineRequest::new(target),
        )
        .unwrap()
    }

    #[test]
    fn primitive_values_stay_unboxed_until_consumed() {
        let ctx = ParsingContext::default();
        let p = pipeline(&ValueType::scalar(ScalarKind::I64));
        let mut setter = DelayedCellSetter::new();
        setter.set(&p, &Cell::Text("12"), &ctx).unwrap();
        assert!(setter.is_set());
        assert_eq!(setter.peek_value(), Some(Value::I64(12)));
        assert_eq!(setter.consume_i64(), Some(12));
        assert!(!setter.is_set());
        assert_eq!(setter.consume_value(), None);
    }

    #[test]
    fn nullable_targets_buffer_null() {
        let ctx = ParsingContext::default();
        let p = pipeline(&ValueType::optional(ValueType::scalar(ScalarKind::Char)));
        let mut setter = DelayedCellSetter::new();
        setter.set(&p, &Cell::Null, &ctx).unwrap();
        assert!(setter.is_null());
        assert_eq!(setter.consume_char(), None);

        setter.set(&p, &Cell::Text("z"), &ctx).unwrap();
        assert_eq!(setter.consume_char(), Some('z'));
    }

    #[test]
    fn failed_set_leaves_buffer_empty() {
        let ctx = ParsingContext::default();
        let p = pipeline(&ValueType::scalar(ScalarKind::I32));
        let mut setter = DelayedCellSetter::new();
        setter.set_value(Value::I32(1));
        assert!(setter.set(&p, &Cell::Text("one"), &ctx).is_err());
        assert!(!setter.is_set());
    }

    #[test]
    fn typed_consumer_of_wrong_kind_yields_none() {
        let mut setter = DelayedCellSetter::new();
        setter.set_value(Value::Bool(true));
        assert_eq!(setter.consume_f64(), None);
        assert!(!setter.is_set());
    }
}
