//! Configuration options for mapper construction.

use serde::{Deserialize, Serialize};

/// Case handling when matching column names to property names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseSensitivity {
    /// Names must match exactly.
    Sensitive,
    /// Exact match first, then ASCII case-insensitive.
    #[default]
    Insensitive,
}

/// What to do with a column that matches no property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnmappedColumnPolicy {
    /// Drop the column.
    #[default]
    Lenient,
    /// Fail pipeline construction.
    Strict,
}

/// How a null cell is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NullPolicy {
    /// Null for nullable targets, zero for unboxed primitives.
    #[default]
    Default,
    /// Every null cell is a conversion error.
    Error,
}

/// Default field-error handler for sessions that do not pick one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldErrorStrategy {
    /// Abort the current row with the error.
    #[default]
    Rethrow,
    /// Record the error, substitute the target default and continue.
    Record,
}

/// Options controlling property resolution and cell handling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapperConfig {
    pub case_sensitivity: CaseSensitivity,
    pub unmapped_columns: UnmappedColumnPolicy,
    pub null_policy: NullPolicy,
    pub field_errors: FieldErrorStrategy,
    /// Separator between segments of a nested property path.
    pub path_separator: char,
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            case_sensitivity: CaseSensitivity::default(),
            unmapped_columns: UnmappedColumnPolicy::default(),
            null_policy: NullPolicy::default(),
            field_errors: FieldErrorStrategy::default(),
            path_separator: '.',
        }
    }
}

impl MapperConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Strict unmapped-column policy and case-sensitive matching.
    pub fn strict() -> Self {
        Self {
            case_sensitivity: CaseSensitivity::Sensitive,
            unmapped_columns: UnmappedColumnPolicy::Strict,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_case_sensitivity(mut self, case: CaseSensitivity) -> Self {
        self.case_sensitivity = case;
        self
    }

    #[must_use]
    pub fn with_unmapped_columns(mut self, policy: UnmappedColumnPolicy) -> Self {
        self.unmapped_columns = policy;
        self
    }

    #[must_use]
    pub fn with_null_policy(mut self, policy: NullPolicy) -> Self {
        self.null_policy = policy;
        self
    }

    #[must_use]
    pub fn with_field_errors(mut self, strategy: FieldErrorStrategy) -> Self {
        self.field_errors = strategy;
        self
    }

    #[must_use]
    pub fn with_path_separator(mut self, separator: char) -> Self {
        self.path_separator = separator;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_fills_defaults() {
        let config: MapperConfig =
            serde_json::from_str(r#"{"unmapped_columns":"strict"}"#).unwrap();
        assert_eq!(config.unmapped_columns, UnmappedColumnPolicy::Strict);
        assert_eq!(config.path_separator, '.');
        assert_eq!(config.null_policy, NullPolicy::Default);
    }
}
