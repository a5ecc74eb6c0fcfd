//! The mapper facade.
//!
//! A [`RowMapper`] targets one root type. It compiles a mapper per column
//! signature on first use, caches it under the comparator for its source
//! kind, and hands out sessions that map rows through it.

use std::iter::FusedIterator;
use std::sync::Arc;

use serde::de::DeserializeOwned;

use rowmap_convert::{ConversionRegistry, ParsingContext, SourceShape};
use rowmap_model::{MapperConfig, TypeMeta, Value};

use crate::cache::MapperCache;
use crate::definitions::ColumnDefinitions;
use crate::error::{MapError, Result};
use crate::handler::{FieldErrorHandler, handler_for};
use crate::instantiate::{Instantiator, RecordInstantiator, from_value};
use crate::key::{
    CsvKeyComparator, DriverKeyComparator, KeyComparator, MapperKey, MapperScope,
    TypeCompatibility,
};
use crate::plan::{CompileOptions, CompiledMapper};
use crate::row::Row;
use crate::session::MappingSession;

/// Maps rows into instances of one root type.
///
/// Cloning shares the mapper cache and the scope of its entries.
#[derive(Debug, Clone)]
pub struct RowMapper {
    root: Arc<TypeMeta>,
    config: MapperConfig,
    definitions: ColumnDefinitions,
    registry: Arc<ConversionRegistry>,
    context: ParsingContext,
    source: SourceShape,
    compatibility: TypeCompatibility,
    cache: Arc<MapperCache<CompiledMapper>>,
    scope: MapperScope,
    instantiator: Arc<dyn Instantiator>,
}

impl RowMapper {
    /// Mapper for text rows (CSV). Columns compare by name.
    pub fn new(root: Arc<TypeMeta>) -> Self {
        Self::with_source(root, SourceShape::Text)
    }

    /// Mapper for typed driver rows. Columns compare by name and declared
    /// type family.
    pub fn for_driver(root: Arc<TypeMeta>) -> Self {
        Self::with_source(root, SourceShape::Native)
    }

    fn with_source(root: Arc<TypeMeta>, source: SourceShape) -> Self {
        let scope = MapperScope::fresh(root.name());
        let mut mapper = Self {
            root,
            config: MapperConfig::default(),
            definitions: ColumnDefinitions::new(),
            registry: Arc::new(ConversionRegistry::default()),
            context: ParsingContext::default(),
            source,
            compatibility: TypeCompatibility::default(),
            cache: Arc::new(MapperCache::new(Arc::new(CsvKeyComparator::default()))),
            scope,
            instantiator: Arc::new(RecordInstantiator),
        };
        mapper.reset_cache();
        mapper
    }

    #[must_use]
    pub fn with_config(mut self, config: MapperConfig) -> Self {
        self.config = config;
        self.reset_cache();
        self
    }

    #[must_use]
    pub fn with_definitions(mut self, definitions: ColumnDefinitions) -> Self {
        self.definitions = definitions;
        self.reset_cache();
        self
    }

    #[must_use]
    pub fn with_registry(mut self, registry: Arc<ConversionRegistry>) -> Self {
        self.registry = registry;
        self.reset_cache();
        self
    }

    #[must_use]
    pub fn with_context(mut self, context: ParsingContext) -> Self {
        self.context = context;
        self.reset_cache();
        self
    }

    #[must_use]
    pub fn with_compatibility(mut self, compatibility: TypeCompatibility) -> Self {
        self.compatibility = compatibility;
        self.reset_cache();
        self
    }

    #[must_use]
    pub fn with_instantiator(mut self, instantiator: Arc<dyn Instantiator>) -> Self {
        self.instantiator = instantiator;
        self
    }

    /// Shares `cache` with other mappers.
    ///
    /// Entries stay scoped to the mapper that compiled them: another root
    /// type or option set never reuses them. Clones share the scope.
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<MapperCache<CompiledMapper>>) -> Self {
        self.cache = cache;
        self
    }

    /// Compiled state is only valid for the options it was built with.
    fn reset_cache(&mut self) {
        self.scope = MapperScope::fresh(self.root.name());
        let comparator: Arc<dyn KeyComparator> = match self.source {
            SourceShape::Text => Arc::new(CsvKeyComparator::new(self.config.case_sensitivity)),
            SourceShape::Native => Arc::new(DriverKeyComparator::new(
                self.config.case_sensitivity,
                self.compatibility.clone(),
            )),
        };
        self.cache = Arc::new(MapperCache::new(comparator));
    }

    pub fn root(&self) -> &Arc<TypeMeta> {
        &self.root
    }

    pub fn config(&self) -> &MapperConfig {
        &self.config
    }

    pub fn definitions(&self) -> &ColumnDefinitions {
        &self.definitions
    }

    pub fn cache(&self) -> &Arc<MapperCache<CompiledMapper>> {
        &self.cache
    }

    pub fn scope(&self) -> &MapperScope {
        &self.scope
    }

    /// The compiled mapper for `key`, built on first use.
    pub fn compile(&self, key: &MapperKey) -> Result<Arc<CompiledMapper>> {
        let scoped = key.clone().with_scope(self.scope.clone());
        self.cache.get_or_build(&scoped, || {
            CompiledMapper::compile(
                Arc::clone(&self.root),
                key.columns(),
                &CompileOptions {
                    config: &self.config,
                    definitions: &self.definitions,
                    registry: &self.registry,
                    context: &self.context,
                    source: self.source,
                },
            )
        })
    }

    /// New session using the configured field-error strategy.
    pub fn session(&self, key: &MapperKey) -> Result<MappingSession> {
        self.session_with_handler(key, handler_for(self.config.field_errors))
    }

    pub fn session_with_handler(
        &self,
        key: &MapperKey,
        handler: Box<dyn FieldErrorHandler>,
    ) -> Result<MappingSession> {
        let mapper = self.compile(key)?;
        Ok(MappingSession::new(
            mapper,
            Arc::clone(&self.instantiator),
            handler,
        ))
    }

    /// Maps one row on its own, without grouping.
    pub fn map<R: Row + ?Sized>(&self, key: &MapperKey, row: &R) -> Result<Value> {
        let mut session = self.session(key)?;
        let first = session.push_row(row)?;
        let last = session.finish()?;
        first.or(last).ok_or_else(|| MapError::Instantiation {
            type_name: self.root.name().to_string(),
            message: "row produced no object".to_string(),
        })
    }

    /// Maps one row into a user type.
    pub fn map_into<T, R>(&self, key: &MapperKey, row: &R) -> Result<T>
    where
        T: DeserializeOwned,
        R: Row + ?Sized,
    {
        from_value(&self.map(key, row)?)
    }

    /// Lazily maps consecutive rows, grouping them into objects by key.
    pub fn map_rows<I>(&self, key: &MapperKey, rows: I) -> Result<MappedRows<I::IntoIter>>
    where
        I: IntoIterator,
        I::Item: Row,
    {
        Ok(MappedRows::new(self.session(key)?, rows.into_iter()))
    }

    /// Maps and collects every object.
    pub fn map_all<I>(&self, key: &MapperKey, rows: I) -> Result<Vec<Value>>
    where
        I: IntoIterator,
        I::Item: Row,
    {
        self.map_rows(key, rows)?.collect()
    }
}

/// Objects assembled from a row iterator.
///
/// The first error ends the sequence.
#[derive(Debug)]
pub struct MappedRows<I> {
    session: MappingSession,
    rows: I,
    done: bool,
}

impl<I> MappedRows<I>
where
    I: Iterator,
    I::Item: Row,
{
    pub fn new(session: MappingSession, rows: I) -> Self {
        Self {
            session,
            rows,
            done: false,
        }
    }

    pub fn session(&self) -> &MappingSession {
        &self.session
    }

    /// Converts each object into `T`.
    pub fn typed<T: DeserializeOwned>(self) -> impl Iterator<Item = Result<T>> {
        self.map(|value| value.and_then(|v| from_value(&v)))
    }
}

impl<I> Iterator for MappedRows<I>
where
    I: Iterator,
    I::Item: Row,
{
    type Item = Result<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        for row in self.rows.by_ref() {
            match self.session.push_row(&row) {
                Ok(Some(value)) => return Some(Ok(value)),
                Ok(None) => {}
                Err(err) => {
                    self.done = true;
                    return Some(Err(err));
                }
            }
        }
        self.done = true;
        self.session.finish().transpose()
    }
}

impl<I> FusedIterator for MappedRows<I>
where
    I: Iterator,
    I::Item: Row,
{
}
