//! Target type trees.
//!
//! A [`TypeMeta`] describes one target type: its properties, their
//! [`ValueType`]s, and whether each is bound to the constructor (and must be
//! buffered until the object can be built) or settable after construction.
//! Trees are built once and shared behind an [`Arc`]; they are immutable
//! after [`TypeMetaBuilder::build`].

use std::fmt;
use std::sync::Arc;

use crate::error::{ModelError, Result};
use crate::options::CaseSensitivity;
use crate::value::{Primitive, ScalarKind, Value};

/// Declared type of a target property.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueType {
    Scalar(ScalarKind),
    /// Nullable wrapper: a null source stays null instead of defaulting.
    Optional(Box<ValueType>),
    Object(Arc<TypeMeta>),
    List(Box<ValueType>),
    /// One of a closed set of names, held as [`Value::Text`].
    Enum(Arc<EnumMeta>),
}

impl ValueType {
    pub fn scalar(kind: ScalarKind) -> Self {
        Self::Scalar(kind)
    }

    pub fn optional(inner: ValueType) -> Self {
        Self::Optional(Box::new(inner))
    }

    pub fn object(meta: Arc<TypeMeta>) -> Self {
        Self::Object(meta)
    }

    pub fn list(element: ValueType) -> Self {
        Self::List(Box::new(element))
    }

    pub fn enumeration(meta: Arc<EnumMeta>) -> Self {
        Self::Enum(meta)
    }

    /// Strips any `Optional` wrapper.
    pub fn unwrapped(&self) -> &ValueType {
        match self {
            Self::Optional(inner) => inner.unwrapped(),
            other => other,
        }
    }

    /// Scalar kind after unwrapping, if the type is scalar.
    pub fn scalar_kind(&self) -> Option<ScalarKind> {
        match self.unwrapped() {
            Self::Scalar(kind) => Some(*kind),
            _ => None,
        }
    }

    pub fn enum_meta(&self) -> Option<&Arc<EnumMeta>> {
        match self.unwrapped() {
            Self::Enum(meta) => Some(meta),
            _ => None,
        }
    }

    /// True when one cell fills a value of this type without a factory.
    pub fn is_leaf(&self) -> bool {
        self.scalar_kind().is_some() || self.enum_meta().is_some()
    }

    pub fn is_optional(&self) -> bool {
        matches!(self, Self::Optional(_))
    }

    /// True when the type is an unboxed primitive (not wrapped in `Optional`).
    pub fn is_unboxed_primitive(&self) -> bool {
        matches!(self, Self::Scalar(kind) if kind.is_primitive())
    }

    pub fn element_type(&self) -> Option<&ValueType> {
        match self.unwrapped() {
            Self::List(element) => Some(element),
            _ => None,
        }
    }

    pub fn object_meta(&self) -> Option<&Arc<TypeMeta>> {
        match self.unwrapped() {
            Self::Object(meta) => Some(meta),
            _ => None,
        }
    }

    /// Value a property of this type holds before anything is assigned.
    ///
    /// Unboxed primitives start at zero, lists start empty, everything else
    /// starts null.
    pub fn default_value(&self) -> Value {
        match self {
            Self::Scalar(kind) => Primitive::zero(*kind).map_or(Value::Null, Value::from),
            Self::List(_) => Value::List(Vec::new()),
            Self::Optional(_) | Self::Object(_) | Self::Enum(_) => Value::Null,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(kind) => write!(f, "{kind}"),
            Self::Optional(inner) => write!(f, "Option<{inner}>"),
            Self::Object(meta) => f.write_str(meta.name()),
            Self::List(element) => write!(f, "List<{element}>"),
            Self::Enum(meta) => f.write_str(meta.name()),
        }
    }
}

/// How a property receives its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    /// Passed to the constructor at `position`; buffered until the object is built.
    Constructor { position: usize, required: bool },
    /// Assigned after construction.
    Setter,
}

/// One node of a target type tree.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyMeta {
    name: String,
    value_type: ValueType,
    binding: Binding,
}

impl PropertyMeta {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value_type(&self) -> &ValueType {
        &self.value_type
    }

    pub fn binding(&self) -> Binding {
        self.binding
    }

    pub fn is_constructor_bound(&self) -> bool {
        matches!(self.binding, Binding::Constructor { .. })
    }

    /// A leaf is directly settable from one cell.
    pub fn is_terminal(&self) -> bool {
        self.value_type.is_leaf()
    }
}

/// Variants of an enum target, in ordinal order.
#[derive(Debug, PartialEq, Eq)]
pub struct EnumMeta {
    name: String,
    variants: Vec<String>,
}

impl EnumMeta {
    pub fn new<I, S>(name: impl Into<String>, variants: I) -> Result<Arc<Self>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let name = name.into().trim().to_string();
        if name.is_empty() {
            return Err(ModelError::InvalidTypeName(name));
        }
        let variants: Vec<String> = variants.into_iter().map(Into::into).collect();
        if variants.is_empty() {
            return Err(ModelError::EmptyEnum(name));
        }
        for (idx, variant) in variants.iter().enumerate() {
            if variant.trim().is_empty() || variants[..idx].contains(variant) {
                return Err(ModelError::DuplicateVariant {
                    type_name: name,
                    variant: variant.clone(),
                });
            }
        }
        Ok(Arc::new(Self { name, variants }))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn variants(&self) -> &[String] {
        &self.variants
    }

    /// Variant named `raw`: exact match first, then ignoring ASCII case.
    pub fn by_name(&self, raw: &str) -> Option<&str> {
        self.variants
            .iter()
            .find(|v| *v == raw)
            .or_else(|| self.variants.iter().find(|v| v.eq_ignore_ascii_case(raw)))
            .map(String::as_str)
    }

    pub fn by_ordinal(&self, ordinal: i64) -> Option<&str> {
        usize::try_from(ordinal)
            .ok()
            .and_then(|i| self.variants.get(i))
            .map(String::as_str)
    }
}

/// Property tree of one target type.
#[derive(Debug, PartialEq)]
pub struct TypeMeta {
    name: String,
    properties: Vec<PropertyMeta>,
    constructor: Vec<usize>,
}

impl TypeMeta {
    pub fn builder(name: impl Into<String>) -> TypeMetaBuilder {
        TypeMetaBuilder {
            name: name.into(),
            properties: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn properties(&self) -> &[PropertyMeta] {
        &self.properties
    }

    pub fn property(&self, index: usize) -> Option<&PropertyMeta> {
        self.properties.get(index)
    }

    /// Index of the property with exactly this name.
    pub fn property_index(&self, name: &str) -> Option<usize> {
        self.properties.iter().position(|p| p.name == name)
    }

    /// Finds a property by name, exact match first, then case-insensitive
    /// when allowed.
    pub fn find_property(&self, name: &str, case: CaseSensitivity) -> Option<usize> {
        self.property_index(name).or_else(|| match case {
            CaseSensitivity::Sensitive => None,
            CaseSensitivity::Insensitive => self
                .properties
                .iter()
                .position(|p| p.name.eq_ignore_ascii_case(name)),
        })
    }

    /// Property indices in constructor argument order.
    pub fn constructor_args(&self) -> &[usize] {
        &self.constructor
    }

    pub fn arity(&self) -> usize {
        self.constructor.len()
    }
}

/// Builder for [`TypeMeta`].
#[derive(Debug)]
pub struct TypeMetaBuilder {
    name: String,
    properties: Vec<PropertyMeta>,
}

impl TypeMetaBuilder {
    /// Adds a required constructor argument at the next position.
    pub fn constructor_arg(self, name: impl Into<String>, value_type: ValueType) -> Self {
        self.push_constructor(name.into(), value_type, true)
    }

    /// Adds a constructor argument that may be left unmapped; it receives
    /// its type's default when no column feeds it.
    pub fn optional_constructor_arg(self, name: impl Into<String>, value_type: ValueType) -> Self {
        self.push_constructor(name.into(), value_type, false)
    }

    /// Adds a property assigned after construction.
    pub fn property(mut self, name: impl Into<String>, value_type: ValueType) -> Self {
        self.properties.push(PropertyMeta {
            name: name.into(),
            value_type,
            binding: Binding::Setter,
        });
        self
    }

    fn push_constructor(mut self, name: String, value_type: ValueType, required: bool) -> Self {
        let position = self
            .properties
            .iter()
            .filter(|p| p.is_constructor_bound())
            .count();
        self.properties.push(PropertyMeta {
            name,
            value_type,
            binding: Binding::Constructor { position, required },
        });
        self
    }

    pub fn build(self) -> Result<Arc<TypeMeta>> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(ModelError::InvalidTypeName(self.name));
        }
        for (idx, property) in self.properties.iter().enumerate() {
            if property.name.trim().is_empty() {
                return Err(ModelError::InvalidPropertyName {
                    type_name: name,
                    property: property.name.clone(),
                });
            }
            if self.properties[..idx].iter().any(|p| p.name == property.name) {
                return Err(ModelError::DuplicateProperty {
                    type_name: name,
                    property: property.name.clone(),
                });
            }
        }
        let mut constructor: Vec<(usize, usize)> = self
            .properties
            .iter()
            .enumerate()
            .filter_map(|(idx, p)| match p.binding {
                Binding::Constructor { position, .. } => Some((position, idx)),
                Binding::Setter => None,
            })
            .collect();
        constructor.sort_unstable();
        Ok(Arc::new(TypeMeta {
            name,
            properties: self.properties,
            constructor: constructor.into_iter().map(|(_, idx)| idx).collect(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person() -> Arc<TypeMeta> {
        TypeMeta::builder("Person")
            .constructor_arg("id", ValueType::scalar(ScalarKind::I32))
            .property("name", ValueType::scalar(ScalarKind::Text))
            .optional_constructor_arg("age", ValueType::optional(ValueType::scalar(ScalarKind::I16)))
            .property("tags", ValueType::list(ValueType::scalar(ScalarKind::Text)))
            .build()
            .unwrap()
    }

    #[test]
    fn constructor_order_follows_declaration() {
        let meta = person();
        assert_eq!(meta.constructor_args(), &[0, 2]);
        assert_eq!(
            meta.property(2).unwrap().binding(),
            Binding::Constructor {
                position: 1,
                required: false
            }
        );
    }

    #[test]
    fn find_property_respects_case_sensitivity() {
        let meta = person();
        assert_eq!(meta.find_property("NAME", CaseSensitivity::Sensitive), None);
        assert_eq!(meta.find_property("NAME", CaseSensitivity::Insensitive), Some(1));
    }

    #[test]
    fn duplicate_property_is_rejected() {
        let err = TypeMeta::builder("X")
            .property("a", ValueType::scalar(ScalarKind::Text))
            .property("a", ValueType::scalar(ScalarKind::I32))
            .build()
            .unwrap_err();
        assert!(matches!(err, ModelError::DuplicateProperty { .. }));
    }

    #[test]
    fn enum_variants_resolve_by_name_or_ordinal() {
        let status = EnumMeta::new("Status", ["Open", "Closed", "closed_early"]).unwrap();
        assert_eq!(status.by_name("Closed"), Some("Closed"));
        assert_eq!(status.by_name("OPEN"), Some("Open"));
        assert_eq!(status.by_name("Pending"), None);
        assert_eq!(status.by_ordinal(2), Some("closed_early"));
        assert_eq!(status.by_ordinal(3), None);
        assert_eq!(status.by_ordinal(-1), None);

        let leaf = ValueType::optional(ValueType::enumeration(status));
        assert!(leaf.is_leaf());
        assert_eq!(leaf.scalar_kind(), None);
        assert_eq!(leaf.to_string(), "Option<Status>");

        assert!(matches!(
            EnumMeta::new("Empty", Vec::<String>::new()),
            Err(ModelError::EmptyEnum(_))
        ));
        assert!(matches!(
            EnumMeta::new("Twice", ["a", "a"]),
            Err(ModelError::DuplicateVariant { .. })
        ));
    }

    #[test]
    fn defaults_by_type() {
        assert_eq!(ValueType::scalar(ScalarKind::I32).default_value(), Value::I32(0));
        assert_eq!(ValueType::scalar(ScalarKind::Text).default_value(), Value::Null);
        assert_eq!(
            ValueType::optional(ValueType::scalar(ScalarKind::I32)).default_value(),
            Value::Null
        );
        assert_eq!(
            ValueType::list(ValueType::scalar(ScalarKind::I32)).default_value(),
            Value::List(vec![])
        );
    }
}
