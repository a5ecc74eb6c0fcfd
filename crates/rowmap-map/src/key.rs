//! Mapper keys and the comparators that define their equivalence.
//!
//! A comparator reduces a [`MapperKey`] to a [`CanonicalKey`]; two keys are
//! equivalent exactly when their canonical forms are equal, which makes the
//! relation reflexive, symmetric and transitive by construction.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use rowmap_model::{CaseSensitivity, ColumnKey, SqlType};

/// The root type and option set compiled entries belong to.
///
/// Every option change yields a new generation, so entries compiled under
/// other options or for another root type never match.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MapperScope {
    type_name: String,
    generation: u64,
}

impl MapperScope {
    /// A scope no earlier call has handed out.
    pub fn fresh(type_name: impl Into<String>) -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(0);
        Self {
            type_name: type_name.into(),
            generation: NEXT.fetch_add(1, Ordering::Relaxed),
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }
}

impl fmt::Display for MapperScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.type_name, self.generation)
    }
}

/// Ordered column signature of one input, optionally scoped to one mapper.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MapperKey {
    columns: Vec<ColumnKey>,
    scope: Option<MapperScope>,
}

impl MapperKey {
    pub fn new(columns: Vec<ColumnKey>) -> Self {
        Self {
            columns,
            scope: None,
        }
    }

    #[must_use]
    pub fn with_scope(mut self, scope: MapperScope) -> Self {
        self.scope = Some(scope);
        self
    }

    pub fn scope(&self) -> Option<&MapperScope> {
        self.scope.as_ref()
    }

    /// Key of text columns named in order, indices assigned by position.
    pub fn from_names<I, S>(names: I) -> rowmap_model::Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns = names
            .into_iter()
            .enumerate()
            .map(|(index, name)| ColumnKey::new(name, index))
            .collect::<rowmap_model::Result<Vec<_>>>()?;
        Ok(Self::new(columns))
    }

    pub fn columns(&self) -> &[ColumnKey] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl fmt::Display for MapperKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, column) in self.columns.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{column}")?;
        }
        f.write_str("]")
    }
}

/// Canonical form of one column under a comparator.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalColumn {
    pub name: String,
    pub index: usize,
    /// Declared-type family, for comparators that consider it.
    pub family: Option<Family>,
}

/// Canonical form of a mapper key; used as the cache's map key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalKey {
    pub scope: Option<MapperScope>,
    pub columns: Vec<CanonicalColumn>,
}

pub trait KeyComparator: Send + Sync + fmt::Debug {
    fn canonical_column(&self, column: &ColumnKey) -> CanonicalColumn;

    fn canonical(&self, key: &MapperKey) -> CanonicalKey {
        CanonicalKey {
            scope: key.scope().cloned(),
            columns: key
                .columns()
                .iter()
                .map(|column| self.canonical_column(column))
                .collect(),
        }
    }

    fn equivalent(&self, a: &MapperKey, b: &MapperKey) -> bool {
        self.canonical(a) == self.canonical(b)
    }
}

fn fold_name(name: &str, case: CaseSensitivity) -> String {
    match case {
        CaseSensitivity::Sensitive => name.to_string(),
        CaseSensitivity::Insensitive => name.to_ascii_lowercase(),
    }
}

/// Text sources: columns compare by name only.
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvKeyComparator {
    pub case: CaseSensitivity,
}

impl CsvKeyComparator {
    pub fn new(case: CaseSensitivity) -> Self {
        Self { case }
    }
}

impl KeyComparator for CsvKeyComparator {
    fn canonical_column(&self, column: &ColumnKey) -> CanonicalColumn {
        CanonicalColumn {
            name: fold_name(column.name(), self.case),
            index: column.index(),
            family: None,
        }
    }
}

/// Driver sources: columns compare by name and declared-type family.
#[derive(Debug, Clone, Default)]
pub struct DriverKeyComparator {
    pub case: CaseSensitivity,
    pub compatibility: TypeCompatibility,
}

impl DriverKeyComparator {
    pub fn new(case: CaseSensitivity, compatibility: TypeCompatibility) -> Self {
        Self {
            case,
            compatibility,
        }
    }
}

impl KeyComparator for DriverKeyComparator {
    fn canonical_column(&self, column: &ColumnKey) -> CanonicalColumn {
        CanonicalColumn {
            name: fold_name(column.name(), self.case),
            index: column.index(),
            family: column
                .declared_type()
                .map(|declared| self.compatibility.family(declared)),
        }
    }
}

/// Compatibility family of a declared type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Family {
    /// Registered under a shared name.
    Registered(String),
    /// Unregistered: compatible with itself only.
    Own(SqlType),
}

/// Declared types that compile to the same pipeline.
///
/// Types are compatible when they are registered under the same family.
/// An unregistered type is only compatible with itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeCompatibility {
    families: HashMap<SqlType, String>,
}

impl Default for TypeCompatibility {
    /// Families of types a driver hands out as the same value kind.
    fn default() -> Self {
        let mut table = Self::empty();
        for declared in [SqlType::Char, SqlType::Varchar, SqlType::Text] {
            table.register(declared, "text");
        }
        for declared in [SqlType::Double, SqlType::Numeric] {
            table.register(declared, "double");
        }
        table
    }
}

impl TypeCompatibility {
    pub fn empty() -> Self {
        Self {
            families: HashMap::new(),
        }
    }

    pub fn register(&mut self, declared: SqlType, family: impl Into<String>) {
        self.families.insert(declared, family.into());
    }

    #[must_use]
    pub fn with(mut self, declared: SqlType, family: impl Into<String>) -> Self {
        self.register(declared, family);
        self
    }

    pub fn family(&self, declared: &SqlType) -> Family {
        match self.families.get(declared) {
            Some(family) => Family::Registered(family.clone()),
            None => Family::Own(declared.clone()),
        }
    }

    pub fn compatible(&self, a: &SqlType, b: &SqlType) -> bool {
        self.family(a) == self.family(b)
    }
}
