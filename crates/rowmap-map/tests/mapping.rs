//! End-to-end mapping of grouped and flat rows.

use std::sync::Arc;

use chrono::NaiveTime;
use proptest::prelude::*;
use serde::Deserialize;

use rowmap_convert::ConvertError;
use rowmap_map::{
    ColumnDefinitions, MapError, MapperKey, RecordingHandler, RowMapper,
};
use rowmap_model::{
    ColumnDefinition, ColumnKey, EnumMeta, MapperConfig, NullPolicy, ScalarKind, SqlType, TypeMeta,
    Value, ValueType,
};

fn tagged() -> Arc<TypeMeta> {
    TypeMeta::builder("Tagged")
        .constructor_arg("id", ValueType::scalar(ScalarKind::I32))
        .property("name", ValueType::optional(ValueType::scalar(ScalarKind::Text)))
        .property("tags", ValueType::list(ValueType::scalar(ScalarKind::Text)))
        .build()
        .unwrap()
}

fn order() -> Arc<TypeMeta> {
    let line = TypeMeta::builder("Line")
        .constructor_arg("sku", ValueType::scalar(ScalarKind::Text))
        .property("qty", ValueType::scalar(ScalarKind::I32))
        .build()
        .unwrap();
    TypeMeta::builder("Order")
        .constructor_arg("id", ValueType::scalar(ScalarKind::I64))
        .property("customer", ValueType::optional(ValueType::scalar(ScalarKind::Text)))
        .property("lines", ValueType::list(ValueType::object(line)))
        .build()
        .unwrap()
}

fn list<'a>(value: &'a Value, property: &str) -> &'a [Value] {
    value
        .as_record()
        .and_then(|r| r.get(property))
        .and_then(Value::as_list)
        .unwrap_or_default()
}

#[test]
fn key_applied_to_a_collection_collects_its_elements() {
    let mapper = RowMapper::new(tagged()).with_definitions(
        ColumnDefinitions::new().with("tag", ColumnDefinition::identity().key_applies_to(["tags"])),
    );
    let key = MapperKey::from_names(["id", "name", "tag"]).unwrap();
    let objects = mapper
        .map_all(&key, [["1", "a", "x"], ["1", "a", "y"]])
        .unwrap();

    assert_eq!(objects.len(), 1);
    let record = objects[0].as_record().unwrap();
    assert_eq!(record.get("id"), Some(&Value::I32(1)));
    assert_eq!(record.get("name"), Some(&Value::text("a")));
    assert_eq!(list(&objects[0], "tags"), &[Value::text("x"), Value::text("y")]);
}

#[test]
fn keys_break_on_converted_values_not_raw_text() {
    let mapper = RowMapper::new(tagged())
        .with_definitions(ColumnDefinitions::new().with("id", ColumnDefinition::identity().key()));
    let key = MapperKey::from_names(["id", "tag"]).unwrap();
    let objects = mapper
        .map_all(&key, [["1", "x"], [" 1", "y"], ["01", "z"]])
        .unwrap();

    assert_eq!(objects.len(), 1);
    assert_eq!(objects[0].as_record().unwrap().get("id"), Some(&Value::I32(1)));
    assert_eq!(list(&objects[0], "tags").len(), 3);
}

#[test]
fn one_key_change_yields_two_objects() {
    let mapper = RowMapper::new(order())
        .with_definitions(ColumnDefinitions::new().with("id", ColumnDefinition::identity().key()));
    let key = MapperKey::from_names(["id", "customer", "lines_sku", "lines_qty"]).unwrap();
    let rows = [
        ["1", "ann", "A", "2"],
        ["1", "ann", "B", "1"],
        ["2", "bob", "C", "5"],
    ];
    let objects = mapper.map_all(&key, rows).unwrap();

    assert_eq!(objects.len(), 2);
    assert_eq!(list(&objects[0], "lines").len(), 2);
    assert_eq!(list(&objects[1], "lines").len(), 1);
    let second_line = list(&objects[0], "lines")[1].as_record().unwrap();
    assert_eq!(second_line.get("sku"), Some(&Value::text("B")));
    assert_eq!(second_line.get("qty"), Some(&Value::I32(1)));
}

#[test]
fn left_join_padding_adds_no_element() {
    let mapper = RowMapper::new(order())
        .with_definitions(ColumnDefinitions::new().with("id", ColumnDefinition::identity().key()));
    let key = MapperKey::from_names(["id", "lines_sku", "lines_qty"]).unwrap();
    let objects = mapper
        .map_all(&key, [["1", "", ""], ["2", "A", "1"]])
        .unwrap();
    assert_eq!(list(&objects[0], "lines").len(), 0);
    assert_eq!(list(&objects[1], "lines").len(), 1);
}

#[test]
fn nested_key_changes_do_not_split_the_parent() {
    let mapper = RowMapper::new(order()).with_definitions(
        ColumnDefinitions::new()
            .with("id", ColumnDefinition::identity().key())
            .with("lines_sku", ColumnDefinition::identity().key()),
    );
    let key = MapperKey::from_names(["id", "lines_sku", "lines_qty"]).unwrap();
    let objects = mapper
        .map_all(&key, [["1", "A", "1"], ["1", "A", "2"], ["1", "B", "3"]])
        .unwrap();
    assert_eq!(objects.len(), 1);
    let lines = list(&objects[0], "lines");
    assert_eq!(lines.len(), 2);
    // The first row of a group supplies the element's values.
    assert_eq!(lines[0].as_record().unwrap().get("qty"), Some(&Value::I32(1)));
}

#[test]
fn indexed_columns_fill_one_list_per_row() {
    let mapper = RowMapper::new(tagged());
    let key = MapperKey::from_names(["id", "tags[1]", "tags_0"]).unwrap();
    let value = mapper.map(&key, &["4", "second", "first"]).unwrap();
    assert_eq!(list(&value, "tags"), &[Value::text("first"), Value::text("second")]);
}

#[test]
fn null_cells_follow_the_null_policy() {
    let key = MapperKey::from_names(["id", "name"]).unwrap();
    let lenient = RowMapper::new(tagged());
    let value = lenient.map(&key, &["", ""]).unwrap();
    let record = value.as_record().unwrap();
    assert_eq!(record.get("id"), Some(&Value::I32(0)));
    assert_eq!(record.get("name"), Some(&Value::Null));

    let strict = RowMapper::new(tagged())
        .with_config(MapperConfig::default().with_null_policy(NullPolicy::Error));
    for row in [["", "a"], ["1", ""]] {
        assert!(matches!(strict.map(&key, &row), Err(MapError::Field { .. })));
    }
}

#[test]
fn defaults_replace_null_cells() {
    let mapper = RowMapper::new(tagged()).with_definitions(
        ColumnDefinitions::new().with("name", ColumnDefinition::identity().default_value("n/a")),
    );
    let key = MapperKey::from_names(["id", "name"]).unwrap();
    let value = mapper.map(&key, &["1", ""]).unwrap();
    assert_eq!(value.as_record().unwrap().get("name"), Some(&Value::text("n/a")));
}

#[test]
fn bigint_narrows_into_a_short() {
    let target = TypeMeta::builder("Narrow")
        .property("value", ValueType::scalar(ScalarKind::I16))
        .build()
        .unwrap();
    let key = MapperKey::new(vec![
        ColumnKey::new("value", 0).unwrap().with_declared_type(SqlType::BigInt),
    ]);
    let text = RowMapper::new(Arc::clone(&target)).map(&key, &["65541"]).unwrap();
    let driver = RowMapper::for_driver(target).map(&key, &[Value::I64(65541)]).unwrap();
    for value in [text, driver] {
        assert_eq!(value.as_record().unwrap().get("value"), Some(&Value::I16(5)));
    }
}

#[test]
fn configuration_errors_surface_on_first_use() {
    let strict = RowMapper::new(tagged()).with_config(MapperConfig::strict());
    let key = MapperKey::from_names(["id", "bogus"]).unwrap();
    assert!(matches!(
        strict.compile(&key),
        Err(MapError::UnmappedColumn { ref column, .. }) if column == "bogus"
    ));

    let missing = MapperKey::from_names(["name"]).unwrap();
    assert!(matches!(
        RowMapper::new(tagged()).map(&missing, &["a"]),
        Err(MapError::MissingConstructorValue { ref property, .. }) if property == "id"
    ));

    let driver = RowMapper::for_driver(tagged());
    let key = MapperKey::new(vec![
        ColumnKey::new("id", 0).unwrap().with_declared_type(SqlType::Timestamp),
    ]);
    assert!(matches!(driver.compile(&key), Err(MapError::Conversion { .. })));

    let short = TypeMeta::builder("Short")
        .property("n", ValueType::scalar(ScalarKind::I16))
        .build()
        .unwrap();
    let undeclared = MapperKey::from_names(["n"]).unwrap();
    assert!(matches!(
        RowMapper::for_driver(short).compile(&undeclared),
        Err(MapError::Conversion {
            source: ConvertError::UndeclaredSource(ScalarKind::I16),
            ..
        })
    ));
}

#[test]
fn enum_and_time_of_day_properties() {
    let state = EnumMeta::new("State", ["open", "closed"]).unwrap();
    let shift = TypeMeta::builder("Shift")
        .constructor_arg("id", ValueType::scalar(ScalarKind::I32))
        .property("state", ValueType::enumeration(state))
        .property("starts", ValueType::scalar(ScalarKind::Time))
        .build()
        .unwrap();
    let key = MapperKey::from_names(["id", "state", "starts"]).unwrap();
    let text = RowMapper::new(Arc::clone(&shift));
    let value = text.map(&key, &["1", "Closed", "08:30:00"]).unwrap();
    let record = value.as_record().unwrap();
    assert_eq!(record.get("state"), Some(&Value::text("closed")));
    assert_eq!(
        record.get("starts"),
        Some(&Value::Time(NaiveTime::from_hms_opt(8, 30, 0).unwrap()))
    );
    assert!(matches!(
        text.map(&key, &["1", "paused", "08:30:00"]),
        Err(MapError::Field { ref column, .. }) if column == "state"
    ));

    let driver = RowMapper::for_driver(shift);
    let typed = MapperKey::new(vec![
        ColumnKey::new("id", 0).unwrap().with_declared_type(SqlType::Integer),
        ColumnKey::new("state", 1).unwrap(),
        ColumnKey::new("starts", 2).unwrap().with_declared_type(SqlType::Time),
    ]);
    let noon = NaiveTime::from_hms_opt(12, 0, 0).unwrap();
    let value = driver
        .map(&typed, &[Value::I32(2), Value::I32(0), Value::Time(noon)])
        .unwrap();
    let record = value.as_record().unwrap();
    assert_eq!(record.get("state"), Some(&Value::text("open")));
    assert_eq!(record.get("starts"), Some(&Value::Time(noon)));
}

#[test]
fn recording_handler_keeps_the_session_going() {
    let mapper = RowMapper::new(tagged());
    let key = MapperKey::from_names(["id", "name"]).unwrap();
    let handler = RecordingHandler::new();
    let mut session = mapper
        .session_with_handler(&key, Box::new(handler.clone()))
        .unwrap();
    session.push_row(&["oops", "a"]).unwrap();
    let first = session.push_row(&["2", "b"]).unwrap().unwrap();
    session.finish().unwrap();

    assert_eq!(first.as_record().unwrap().get("id"), Some(&Value::I32(0)));
    let errors = handler.errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].column, "id");
    assert_eq!(errors[0].row, 1);
}

#[derive(Debug, Deserialize, PartialEq)]
struct Tagged {
    id: i32,
    name: Option<String>,
    tags: Vec<String>,
}

#[test]
fn typed_results() {
    let mapper = RowMapper::new(tagged());
    let key = MapperKey::from_names(["id", "name", "tag"]).unwrap();
    let one: Tagged = mapper.map_into(&key, &["3", "c", "z"]).unwrap();
    assert_eq!(
        one,
        Tagged {
            id: 3,
            name: Some("c".to_string()),
            tags: vec!["z".to_string()]
        }
    );

    let all: Vec<Tagged> = mapper
        .map_rows(&key, [["1", "a", "x"], ["1", "a", "y"]])
        .unwrap()
        .typed()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].tags, vec!["x".to_string(), "y".to_string()]);
}

fn flip_case(name: &str, mask: u32) -> String {
    name.chars()
        .enumerate()
        .map(|(i, c)| {
            if mask & (1 << (i % 32)) != 0 {
                c.to_ascii_uppercase()
            } else {
                c
            }
        })
        .collect()
}

proptest! {
    #[test]
    fn rows_without_keys_collapse_into_one_object(tags in prop::collection::vec("[a-z]{1,6}", 1..20)) {
        let mapper = RowMapper::new(tagged());
        let key = MapperKey::from_names(["id", "tag"]).unwrap();
        let rows: Vec<Vec<String>> = tags.iter().map(|t| vec!["1".to_string(), t.clone()]).collect();
        let objects = mapper.map_all(&key, rows).unwrap();
        prop_assert_eq!(objects.len(), 1);
        prop_assert_eq!(list(&objects[0], "tags").len(), tags.len());
    }

    #[test]
    fn equivalent_signatures_share_one_pipeline(a in any::<u32>(), b in any::<u32>()) {
        let mapper = RowMapper::new(tagged());
        let first = MapperKey::from_names([flip_case("id", a), flip_case("name", a)]).unwrap();
        let second = MapperKey::from_names([flip_case("id", b), flip_case("name", b)]).unwrap();
        let x = mapper.compile(&first).unwrap();
        let y = mapper.compile(&second).unwrap();
        prop_assert!(Arc::ptr_eq(&x, &y));
    }
}
