//! Conversion chain and cell pipeline behaviour across crates.

use proptest::prelude::*;
use rowmap_convert::{
    Cell, CellPipeline, CellWriter, ConversionRegistry, ConvertError, ParsingContext,
    PipelineRequest, SourceShape,
};
use rowmap_model::{NullPolicy, Primitive, ScalarKind, SqlType, Value, ValueType};

fn pipeline(target: ScalarKind, declared: Option<&SqlType>) -> CellPipeline {
    let target = ValueType::scalar(target);
    CellPipeline::build(
        &ConversionRegistry::default(),
        &ParsingContext::default(),
        &PipelineRequest::new(&target).with_declared(declared),
    )
    .unwrap()
}

#[test]
fn bigint_column_into_short_property() {
    let ctx = ParsingContext::default();
    let short = pipeline(ScalarKind::I16, Some(&SqlType::BigInt));
    assert_eq!(
        short.read(&Cell::Text("65541"), &ctx).unwrap(),
        Value::I16(5)
    );
}

#[test]
fn timestamp_column_cannot_become_a_short() {
    let target = ValueType::scalar(ScalarKind::I16);
    let err = CellPipeline::build(
        &ConversionRegistry::default(),
        &ParsingContext::default(),
        &PipelineRequest::new(&target)
            .with_source(SourceShape::Native)
            .with_declared(Some(&SqlType::Timestamp)),
    )
    .unwrap_err();
    assert!(matches!(err, ConvertError::UnsupportedNarrowing { .. }));
}

#[test]
fn null_is_an_error_mode_always_fails() {
    let ctx = ParsingContext::default();
    for kind in ScalarKind::ALL {
        let target = ValueType::scalar(kind);
        let p = CellPipeline::build(
            &ConversionRegistry::default(),
            &ctx,
            &PipelineRequest::new(&target).with_null_policy(NullPolicy::Error),
        )
        .unwrap();
        assert!(p.read(&Cell::Null, &ctx).is_err(), "{kind} accepted null");
        assert!(p.read(&Cell::Text(""), &ctx).is_err(), "{kind} accepted empty");
    }
}

#[test]
fn null_maps_to_zero_or_null_by_default() {
    let ctx = ParsingContext::default();
    for kind in ScalarKind::ALL {
        let p = pipeline(kind, None);
        let expected = Primitive::zero(kind).map_or(Value::Null, Value::from);
        assert_eq!(p.read(&Cell::Null, &ctx).unwrap(), expected);
    }
}

proptest! {
    #[test]
    fn narrowing_matches_twos_complement(n in any::<i64>()) {
        let ctx = ParsingContext::default();
        let short = pipeline(ScalarKind::I16, Some(&SqlType::BigInt));
        let text = n.to_string();
        prop_assert_eq!(short.read(&Cell::Text(&text), &ctx).unwrap(), Value::I16(n as i16));
        let byte = pipeline(ScalarKind::I8, Some(&SqlType::BigInt));
        prop_assert_eq!(byte.read(&Cell::I64(n), &ctx), byte.read(&Cell::Text(&text), &ctx));
    }

    #[test]
    fn written_integers_read_back(n in any::<i32>()) {
        let ctx = ParsingContext::default();
        let text = CellWriter::new().write(&Value::I32(n), &ctx);
        let p = pipeline(ScalarKind::I32, None);
        prop_assert_eq!(p.read(&Cell::Text(&text), &ctx).unwrap(), Value::I32(n));
    }

    #[test]
    fn written_doubles_read_back(x in proptest::num::f64::NORMAL) {
        let ctx = ParsingContext::default();
        let text = CellWriter::new().write(&Value::F64(x), &ctx);
        let p = pipeline(ScalarKind::F64, None);
        prop_assert_eq!(p.read(&Cell::Text(&text), &ctx).unwrap(), Value::F64(x));
    }
}
