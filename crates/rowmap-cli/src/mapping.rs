//! Mapping files.
//!
//! A mapping file is JSON describing the target type tree together with
//! column definitions, mapper options and the CSV dialect:
//!
//! ```json
//! {
//!   "target": {
//!     "name": "Order",
//!     "properties": [
//!       { "name": "id", "type": "i64", "binding": "constructor" },
//!       { "name": "status", "type": { "enum": "Status", "variants": ["open", "closed"] } },
//!       { "name": "lines", "type": { "list": {
//!           "name": "Line",
//!           "properties": [ { "name": "sku", "type": "text", "optional": true } ]
//!       } } }
//!     ]
//!   },
//!   "columns": { "id": [ { "kind": "key" } ] }
//! }
//! ```

use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::debug;

use rowmap_convert::{ConversionRegistry, ParsingContext};
use rowmap_csv::CsvDialect;
use rowmap_map::{ColumnDefinitions, RowMapper};
use rowmap_model::{EnumMeta, MapperConfig, ScalarKind, TypeMeta, Value, ValueType};

/// A parsed mapping file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MappingFile {
    pub target: TypeSpec,
    #[serde(default)]
    pub columns: ColumnDefinitions,
    #[serde(default)]
    pub config: MapperConfig,
    #[serde(default)]
    pub dialect: CsvDialect,
    #[serde(default)]
    pub context: ContextSpec,
    /// Group consecutive rows into one object by key columns. When off,
    /// every row is mapped on its own.
    #[serde(default = "default_grouped")]
    pub grouped: bool,
}

fn default_grouped() -> bool {
    true
}

/// An object type: a name and its properties in declaration order.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TypeSpec {
    pub name: String,
    pub properties: Vec<PropertySpec>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PropertySpec {
    pub name: String,
    #[serde(rename = "type")]
    pub value_type: TypeRef,
    #[serde(default)]
    pub binding: BindingSpec,
    /// Nullable property.
    #[serde(default)]
    pub optional: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BindingSpec {
    #[default]
    Setter,
    Constructor,
    /// Constructor argument that may stay unmapped.
    OptionalConstructor,
}

/// A property type: a scalar kind name, `{"list": <type>}`, an enum
/// `{"enum": <name>, "variants": [..]}` or a nested object.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TypeRef {
    Scalar(ScalarKind),
    List {
        list: Box<TypeRef>,
    },
    Enum {
        #[serde(rename = "enum")]
        name: String,
        variants: Vec<String>,
    },
    Object(TypeSpec),
}

/// Overrides for the parsing context; unset fields keep their defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ContextSpec {
    pub date_format: Option<String>,
    pub datetime_formats: Option<Vec<String>>,
    pub time_format: Option<String>,
    pub trim_numbers: Option<bool>,
}

impl ContextSpec {
    pub fn build(&self) -> ParsingContext {
        let mut context = ParsingContext::default();
        if let Some(format) = &self.date_format {
            context.date_format.clone_from(format);
        }
        if let Some(formats) = &self.datetime_formats {
            context.datetime_formats.clone_from(formats);
        }
        if let Some(format) = &self.time_format {
            context.time_format.clone_from(format);
        }
        if let Some(trim) = self.trim_numbers {
            context.trim_numbers = trim;
        }
        context
    }
}

impl MappingFile {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("read mapping file {}", path.display()))?;
        let mapping = Self::from_json(&text)
            .with_context(|| format!("parse mapping file {}", path.display()))?;
        debug!(
            path = %path.display(),
            target = %mapping.target.name,
            columns = mapping.columns.len(),
            "loaded mapping file"
        );
        Ok(mapping)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Builds the target type tree.
    pub fn target_meta(&self) -> Result<Arc<TypeMeta>> {
        build_type(&self.target)
    }

    /// A mapper configured from this file, with the command-line converters
    /// registered by name.
    pub fn mapper(&self) -> Result<RowMapper> {
        Ok(RowMapper::new(self.target_meta()?)
            .with_config(self.config.clone())
            .with_definitions(self.columns.clone())
            .with_context(self.context.build())
            .with_registry(Arc::new(registry())))
    }
}

fn build_type(spec: &TypeSpec) -> Result<Arc<TypeMeta>> {
    let mut builder = TypeMeta::builder(spec.name.as_str());
    for property in &spec.properties {
        let mut value_type = build_ref(&property.value_type)
            .with_context(|| format!("property {}.{}", spec.name, property.name))?;
        if property.optional {
            value_type = ValueType::optional(value_type);
        }
        let name = property.name.as_str();
        builder = match property.binding {
            BindingSpec::Setter => builder.property(name, value_type),
            BindingSpec::Constructor => builder.constructor_arg(name, value_type),
            BindingSpec::OptionalConstructor => builder.optional_constructor_arg(name, value_type),
        };
    }
    Ok(builder.build()?)
}

fn build_ref(spec: &TypeRef) -> Result<ValueType> {
    Ok(match spec {
        TypeRef::Scalar(kind) => ValueType::scalar(*kind),
        TypeRef::List { list } => ValueType::list(build_ref(list)?),
        TypeRef::Enum { name, variants } => {
            ValueType::enumeration(EnumMeta::new(name.as_str(), variants.iter().cloned())?)
        }
        TypeRef::Object(nested) => ValueType::object(build_type(nested)?),
    })
}

/// Default conversions plus the text converters columns can name:
/// `trim`, `upper` and `lower`.
pub fn registry() -> ConversionRegistry {
    let mut registry = ConversionRegistry::default();
    registry.register_named("trim", ScalarKind::Text, |value, _| {
        Ok(map_text(value, |s| s.trim().to_string()))
    });
    registry.register_named("upper", ScalarKind::Text, |value, _| {
        Ok(map_text(value, |s| s.to_uppercase()))
    });
    registry.register_named("lower", ScalarKind::Text, |value, _| {
        Ok(map_text(value, |s| s.to_lowercase()))
    });
    registry
}

fn map_text(value: Value, f: impl Fn(&str) -> String) -> Value {
    match value {
        Value::Text(text) => Value::Text(f(&text)),
        other => other,
    }
}
