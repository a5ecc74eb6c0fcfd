//! Column definitions: orthogonal per-column options.
//!
//! A [`ColumnDefinition`] is an ordered list of [`ColumnProperty`] values.
//! Lookups return the first matching property, so composing `b` onto `a`
//! places `b`'s properties first and lets them win on conflict.

use serde::{Deserialize, Serialize};

use crate::column::ColumnKey;

/// Which object level a key column identifies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyScope {
    /// The level owning the property the column maps to.
    Owner,
    /// The levels named by these property paths (`""` is the root).
    AppliesTo(Vec<String>),
}

impl KeyScope {
    /// True when this scope places the key on the level at `path`.
    ///
    /// `owner` is the path of the level the column's property belongs to.
    pub fn applies_to(&self, path: &str, owner: &str) -> bool {
        match self {
            Self::Owner => path == owner,
            Self::AppliesTo(paths) => paths.iter().any(|p| p == path),
        }
    }
}

/// One column option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ColumnProperty {
    /// Match the column against this property name instead of its own.
    Rename { name: String },
    /// Do not map the column.
    Ignore,
    /// The column identifies objects for break detection.
    Key {
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        applies_to: Vec<String>,
    },
    /// Date / timestamp pattern (chrono `strftime` syntax).
    Format { pattern: String },
    /// Named converter from the conversion registry.
    Converter { name: String },
    /// Raw cell text substituted when the cell is null.
    Default { value: String },
}

/// Discriminant of a [`ColumnProperty`], for `has` / `look_for`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyKind {
    Rename,
    Ignore,
    Key,
    Format,
    Converter,
    Default,
}

impl ColumnProperty {
    pub fn kind(&self) -> PropertyKind {
        match self {
            Self::Rename { .. } => PropertyKind::Rename,
            Self::Ignore => PropertyKind::Ignore,
            Self::Key { .. } => PropertyKind::Key,
            Self::Format { .. } => PropertyKind::Format,
            Self::Converter { .. } => PropertyKind::Converter,
            Self::Default { .. } => PropertyKind::Default,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColumnDefinition {
    properties: Vec<ColumnProperty>,
}

impl ColumnDefinition {
    /// A definition with no properties.
    pub fn identity() -> Self {
        Self::default()
    }

    pub fn properties(&self) -> &[ColumnProperty] {
        &self.properties
    }

    #[must_use]
    pub fn add(mut self, property: ColumnProperty) -> Self {
        self.properties.push(property);
        self
    }

    #[must_use]
    pub fn rename(self, name: impl Into<String>) -> Self {
        self.add(ColumnProperty::Rename { name: name.into() })
    }

    #[must_use]
    pub fn ignore(self) -> Self {
        self.add(ColumnProperty::Ignore)
    }

    #[must_use]
    pub fn key(self) -> Self {
        self.add(ColumnProperty::Key {
            applies_to: Vec::new(),
        })
    }

    #[must_use]
    pub fn key_applies_to<I, S>(self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.add(ColumnProperty::Key {
            applies_to: paths.into_iter().map(Into::into).collect(),
        })
    }

    #[must_use]
    pub fn format(self, pattern: impl Into<String>) -> Self {
        self.add(ColumnProperty::Format {
            pattern: pattern.into(),
        })
    }

    #[must_use]
    pub fn converter(self, name: impl Into<String>) -> Self {
        self.add(ColumnProperty::Converter { name: name.into() })
    }

    #[must_use]
    pub fn default_value(self, value: impl Into<String>) -> Self {
        self.add(ColumnProperty::Default {
            value: value.into(),
        })
    }

    /// Union of both definitions; `other` wins on conflict.
    #[must_use]
    pub fn compose(&self, other: &ColumnDefinition) -> Self {
        let mut properties = other.properties.clone();
        properties.extend(self.properties.iter().cloned());
        Self { properties }
    }

    pub fn look_for(&self, kind: PropertyKind) -> Option<&ColumnProperty> {
        self.properties.iter().find(|p| p.kind() == kind)
    }

    pub fn look_for_all(&self, kind: PropertyKind) -> impl Iterator<Item = &ColumnProperty> {
        self.properties.iter().filter(move |p| p.kind() == kind)
    }

    pub fn has(&self, kind: PropertyKind) -> bool {
        self.look_for(kind).is_some()
    }

    /// The key as seen by property resolution: renamed if a rename is present.
    pub fn renamed(&self, key: &ColumnKey) -> ColumnKey {
        match self.look_for(PropertyKind::Rename) {
            Some(ColumnProperty::Rename { name }) => key.alias(name.clone()),
            _ => key.clone(),
        }
    }

    pub fn is_ignored(&self) -> bool {
        self.has(PropertyKind::Ignore)
    }

    pub fn is_key(&self) -> bool {
        self.has(PropertyKind::Key)
    }

    pub fn key_scope(&self) -> Option<KeyScope> {
        match self.look_for(PropertyKind::Key) {
            Some(ColumnProperty::Key { applies_to }) if applies_to.is_empty() => {
                Some(KeyScope::Owner)
            }
            Some(ColumnProperty::Key { applies_to }) => Some(KeyScope::AppliesTo(applies_to.clone())),
            _ => None,
        }
    }

    pub fn format_pattern(&self) -> Option<&str> {
        match self.look_for(PropertyKind::Format) {
            Some(ColumnProperty::Format { pattern }) => Some(pattern),
            _ => None,
        }
    }

    pub fn converter_name(&self) -> Option<&str> {
        match self.look_for(PropertyKind::Converter) {
            Some(ColumnProperty::Converter { name }) => Some(name),
            _ => None,
        }
    }

    pub fn default_text(&self) -> Option<&str> {
        match self.look_for(PropertyKind::Default) {
            Some(ColumnProperty::Default { value }) => Some(value),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compose_gives_precedence_to_argument() {
        let base = ColumnDefinition::identity().rename("a").format("%Y");
        let over = ColumnDefinition::identity().rename("b");
        let composed = base.compose(&over);

        let key = ColumnKey::new("col", 0).unwrap();
        assert_eq!(composed.renamed(&key).name(), "b");
        assert_eq!(composed.format_pattern(), Some("%Y"));
        assert_eq!(composed.look_for_all(PropertyKind::Rename).count(), 2);
    }

    #[test]
    fn key_scope_defaults_to_owner() {
        assert_eq!(ColumnDefinition::identity().key().key_scope(), Some(KeyScope::Owner));
        assert_eq!(
            ColumnDefinition::identity().key_applies_to(["tags"]).key_scope(),
            Some(KeyScope::AppliesTo(vec!["tags".to_string()]))
        );
        assert_eq!(ColumnDefinition::identity().key_scope(), None);
    }

    #[test]
    fn key_scope_matching() {
        assert!(KeyScope::Owner.applies_to("orders", "orders"));
        assert!(!KeyScope::Owner.applies_to("", "orders"));
        assert!(KeyScope::AppliesTo(vec![String::new()]).applies_to("", "orders"));
    }

    #[test]
    fn deserializes_from_tagged_json() {
        let json = r#"[{"kind":"rename","name":"id"},{"kind":"key"},{"kind":"ignore"}]"#;
        let def: ColumnDefinition = serde_json::from_str(json).unwrap();
        assert!(def.is_key());
        assert!(def.is_ignored());
        assert_eq!(def.key_scope(), Some(KeyScope::Owner));
    }
}
