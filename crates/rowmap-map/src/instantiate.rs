//! Object construction.
//!
//! The engine hands an [`Instantiator`] the positional constructor values
//! it buffered; properties bound to setters are assigned afterwards.

use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;

use rowmap_model::{Record, TypeMeta, Value};

use crate::error::{MapError, Result};

pub trait Instantiator: Send + Sync + fmt::Debug {
    /// Builds an instance of `meta` from its constructor arguments, in
    /// [`TypeMeta::constructor_args`] order.
    fn instantiate(&self, meta: &Arc<TypeMeta>, args: Vec<Value>) -> Result<Record>;

    /// Assigns a setter-bound property after construction.
    fn assign(&self, record: &mut Record, property: usize, value: Value) -> Result<()> {
        match record.field_mut(property) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(MapError::Instantiation {
                type_name: record.type_name().to_string(),
                message: format!("no property at index {property}"),
            }),
        }
    }
}

/// Builds plain [`Record`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordInstantiator;

impl Instantiator for RecordInstantiator {
    fn instantiate(&self, meta: &Arc<TypeMeta>, args: Vec<Value>) -> Result<Record> {
        if args.len() != meta.arity() {
            return Err(MapError::Instantiation {
                type_name: meta.name().to_string(),
                message: format!("expected {} arguments, got {}", meta.arity(), args.len()),
            });
        }
        let mut record = Record::new(Arc::clone(meta));
        for (&property, value) in meta.constructor_args().iter().zip(args) {
            record.set_index(property, value);
        }
        Ok(record)
    }
}

/// Converts a mapped value into a user type through its serde form.
pub fn from_value<T: DeserializeOwned>(value: &Value) -> Result<T> {
    let type_name = match value {
        Value::Record(record) => record.type_name().to_string(),
        _ => "value".to_string(),
    };
    let json = serde_json::to_value(value).map_err(|err| MapError::Deserialize {
        type_name: type_name.clone(),
        message: err.to_string(),
    })?;
    serde_json::from_value(json).map_err(|err| MapError::Deserialize {
        type_name,
        message: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use rowmap_model::{ScalarKind, ValueType};
    use serde::Deserialize;

    use super::*;

    fn point() -> Arc<TypeMeta> {
        TypeMeta::builder("Point")
            .property("label", ValueType::optional(ValueType::scalar(ScalarKind::Text)))
            .constructor_arg("x", ValueType::scalar(ScalarKind::I32))
            .constructor_arg("y", ValueType::scalar(ScalarKind::I32))
            .build()
            .unwrap()
    }

    #[test]
    fn constructor_values_land_in_declared_slots() {
        let meta = point();
        let mut record = RecordInstantiator
            .instantiate(&meta, vec![Value::I32(3), Value::I32(4)])
            .unwrap();
        assert_eq!(record.get("x"), Some(&Value::I32(3)));
        assert_eq!(record.get("y"), Some(&Value::I32(4)));
        assert_eq!(record.get("label"), Some(&Value::Null));

        RecordInstantiator
            .assign(&mut record, 0, Value::text("p"))
            .unwrap();
        assert_eq!(record.get("label"), Some(&Value::text("p")));
    }

    #[test]
    fn arity_mismatch_is_rejected() {
        let err = RecordInstantiator
            .instantiate(&point(), vec![Value::I32(1)])
            .unwrap_err();
        assert!(matches!(err, MapError::Instantiation { .. }));
    }

    #[test]
    fn records_deserialize_into_structs() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct Point {
            label: Option<String>,
            x: i32,
            y: i32,
        }

        let record = RecordInstantiator
            .instantiate(&point(), vec![Value::I32(1), Value::I32(2)])
            .unwrap();
        let typed: Point = from_value(&Value::Record(record)).unwrap();
        assert_eq!(
            typed,
            Point {
                label: None,
                x: 1,
                y: 2
            }
        );
    }
}
