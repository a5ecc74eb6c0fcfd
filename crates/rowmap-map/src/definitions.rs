//! Column definitions by column name.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use rowmap_model::{CaseSensitivity, ColumnDefinition, ColumnKey};

/// Definitions a mapper applies to the columns it compiles.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColumnDefinitions {
    by_name: BTreeMap<String, ColumnDefinition>,
}

impl ColumnDefinitions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a definition; a second definition for the same name is
    /// composed on top of the first.
    pub fn insert(&mut self, name: impl Into<String>, definition: ColumnDefinition) {
        let name = name.into();
        let composed = match self.by_name.get(&name) {
            Some(existing) => existing.compose(&definition),
            None => definition,
        };
        self.by_name.insert(name, composed);
    }

    #[must_use]
    pub fn with(mut self, name: impl Into<String>, definition: ColumnDefinition) -> Self {
        self.insert(name, definition);
        self
    }

    /// Definition for `key`: exact name first, then case-insensitive when
    /// allowed, else the identity definition.
    pub fn lookup(&self, key: &ColumnKey, case: CaseSensitivity) -> ColumnDefinition {
        if let Some(definition) = self.by_name.get(key.name()) {
            return definition.clone();
        }
        let folded = match case {
            CaseSensitivity::Sensitive => None,
            CaseSensitivity::Insensitive => self
                .by_name
                .iter()
                .find(|(name, _)| key.name_matches(name, case)),
        };
        folded
            .map(|(_, definition)| definition.clone())
            .unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ColumnDefinition)> {
        self.by_name.iter().map(|(name, def)| (name.as_str(), def))
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}
