//! Compiled mappers.
//!
//! Compilation resolves every column to a property path, builds its cell
//! pipeline, and splits the target tree into levels: the root plus one level
//! per collection reached without an index. Each level owns an object plan
//! describing how one element is built from the columns that feed it, and
//! the key columns its break detector compares. The result is immutable and
//! shared by every session using the same column signature.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use rowmap_convert::{CellPipeline, ConversionRegistry, ParsingContext, PipelineRequest, SourceShape};
use rowmap_model::{
    Binding, ColumnDefinition, ColumnKey, KeyScope, MapperConfig, ScalarKind, TypeMeta,
    UnmappedColumnPolicy, ValueType,
};

use crate::definitions::ColumnDefinitions;
use crate::error::{MapError, Result};
use crate::resolve::{PathResolver, PathStep, PropertyPath};

/// How a mapped column's value reaches its object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Routing {
    /// Buffered until the owning object is constructed.
    Constructor { position: usize },
    /// Assigned after construction, in column order.
    Setter,
    /// Becomes one element of a collection.
    Element,
}

impl Routing {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Constructor { .. } => "constructor",
            Self::Setter => "setter",
            Self::Element => "element",
        }
    }
}

/// One mapped column.
#[derive(Debug, Clone)]
pub struct ColumnPlan {
    pub(crate) key: ColumnKey,
    pub(crate) path: PropertyPath,
    pub(crate) pipeline: CellPipeline,
    pub(crate) routing: Routing,
    pub(crate) level: usize,
    /// Position among the level's columns.
    pub(crate) position: usize,
}

impl ColumnPlan {
    pub fn key(&self) -> &ColumnKey {
        &self.key
    }

    pub fn path(&self) -> &PropertyPath {
        &self.path
    }

    pub fn pipeline(&self) -> &CellPipeline {
        &self.pipeline
    }

    pub fn routing(&self) -> Routing {
        self.routing
    }

    pub fn level(&self) -> usize {
        self.level
    }
}

/// A column compared by a level's break detector.
#[derive(Debug, Clone)]
pub struct KeyColumn {
    pub name: String,
    pub index: usize,
    pub(crate) source: KeySource,
}

impl KeyColumn {
    /// The mapped column whose converted value is compared, if any.
    pub fn column(&self) -> Option<usize> {
        match self.source {
            KeySource::Mapped(column) => Some(column),
            KeySource::Text(_) | KeySource::Raw => None,
        }
    }
}

/// Where a key's comparison value comes from.
#[derive(Debug, Clone)]
pub(crate) enum KeySource {
    /// Value buffered by the mapped column's setter.
    Mapped(usize),
    /// Key-only text column, read through its own pipeline.
    Text(CellPipeline),
    /// Key-only driver column, compared as the driver typed it.
    Raw,
}

#[derive(Debug, Clone)]
pub(crate) enum Node {
    Unset,
    Cell(usize),
    Object(ObjectPlan),
}

#[derive(Debug, Clone)]
pub(crate) enum Fill {
    Node(Node),
    /// List elements addressed by index within one row.
    Indexed(Vec<(usize, Node)>),
    /// List assembled by a child level.
    Collection(usize),
}

#[derive(Debug, Clone)]
pub(crate) struct ObjectPlan {
    pub(crate) meta: Arc<TypeMeta>,
    /// Filled properties in column order.
    pub(crate) fills: Vec<(usize, Fill)>,
}

impl ObjectPlan {
    fn new(meta: Arc<TypeMeta>) -> Self {
        Self {
            meta,
            fills: Vec::new(),
        }
    }

    fn fill_mut(&mut self, property: usize, create: impl FnOnce() -> Fill) -> &mut Fill {
        let at = match self.fills.iter().position(|(p, _)| *p == property) {
            Some(at) => at,
            None => {
                self.fills.push((property, create()));
                self.fills.len() - 1
            }
        };
        &mut self.fills[at].1
    }
}

/// One nesting level: the root or a collection.
#[derive(Debug, Clone)]
pub struct LevelPlan {
    pub(crate) path: String,
    pub(crate) parent: Option<usize>,
    /// Position among the parent's child levels.
    pub(crate) parent_slot: usize,
    pub(crate) element_type: ValueType,
    pub(crate) element: Node,
    pub(crate) keys: Vec<KeyColumn>,
    /// Columns feeding this level, in column order.
    pub(crate) columns: Vec<usize>,
    pub(crate) children: Vec<usize>,
}

impl LevelPlan {
    /// Dotted property path, `""` for the root.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn parent(&self) -> Option<usize> {
        self.parent
    }

    pub fn keys(&self) -> &[KeyColumn] {
        &self.keys
    }

    pub fn columns(&self) -> &[usize] {
        &self.columns
    }

    pub fn children(&self) -> &[usize] {
        &self.children
    }

    pub fn element_type(&self) -> &ValueType {
        &self.element_type
    }

    /// Without keys, a level with nested collections never breaks on its
    /// own; one without breaks on every row.
    pub fn breaks_without_keys(&self) -> bool {
        self.children.is_empty()
    }
}

/// Inputs to [`CompiledMapper::compile`].
#[derive(Debug, Clone, Copy)]
pub struct CompileOptions<'a> {
    pub config: &'a MapperConfig,
    pub definitions: &'a ColumnDefinitions,
    pub registry: &'a ConversionRegistry,
    pub context: &'a ParsingContext,
    pub source: SourceShape,
}

/// Immutable pipeline mapping one column signature into one target type.
#[derive(Debug, Clone)]
pub struct CompiledMapper {
    pub(crate) root: Arc<TypeMeta>,
    pub(crate) columns: Vec<ColumnPlan>,
    pub(crate) levels: Vec<LevelPlan>,
    pub(crate) context: ParsingContext,
}

impl CompiledMapper {
    pub fn compile(
        root: Arc<TypeMeta>,
        columns: &[ColumnKey],
        options: &CompileOptions<'_>,
    ) -> Result<Self> {
        let compiler = Compiler {
            resolver: PathResolver::new(Arc::clone(&root), options.config),
            options,
            columns: Vec::new(),
            levels: vec![LevelPlan {
                path: String::new(),
                parent: None,
                parent_slot: 0,
                element_type: ValueType::object(Arc::clone(&root)),
                element: Node::Object(ObjectPlan::new(Arc::clone(&root))),
                keys: Vec::new(),
                columns: Vec::new(),
                children: Vec::new(),
            }],
            level_ids: HashMap::new(),
        };
        let mapper = compiler.run(columns)?;
        debug!(
            target_type = mapper.root.name(),
            columns = mapper.columns.len(),
            levels = mapper.levels.len(),
            "compiled mapper"
        );
        Ok(mapper)
    }

    pub fn root(&self) -> &Arc<TypeMeta> {
        &self.root
    }

    pub fn columns(&self) -> &[ColumnPlan] {
        &self.columns
    }

    pub fn levels(&self) -> &[LevelPlan] {
        &self.levels
    }

    pub fn context(&self) -> &ParsingContext {
        &self.context
    }
}

struct Compiler<'a> {
    resolver: PathResolver,
    options: &'a CompileOptions<'a>,
    columns: Vec<ColumnPlan>,
    levels: Vec<LevelPlan>,
    level_ids: HashMap<Vec<PathStep>, usize>,
}

/// Key declaration waiting for levels to exist.
struct PendingKey {
    key: ColumnKey,
    source: KeySource,
    scope: KeyScope,
}

impl Compiler<'_> {
    fn run(mut self, keys: &[ColumnKey]) -> Result<CompiledMapper> {
        let mut pending_keys = Vec::new();
        for key in keys {
            let definition = self
                .options
                .definitions
                .lookup(key, self.options.config.case_sensitivity);
            let column = self.add_column(key, &definition)?;
            if let Some(scope) = definition.key_scope() {
                let source = match (column, self.options.source) {
                    (Some(column), _) => KeySource::Mapped(column),
                    (None, SourceShape::Native) => KeySource::Raw,
                    (None, SourceShape::Text) => {
                        KeySource::Text(self.key_pipeline(key, &definition)?)
                    }
                };
                pending_keys.push(PendingKey {
                    key: key.clone(),
                    source,
                    scope,
                });
            }
        }

        for idx in 0..self.columns.len() {
            self.assign_levels(idx);
        }
        for idx in 0..self.columns.len() {
            self.place(idx)?;
        }
        for pending in pending_keys {
            self.attach_key(pending)?;
        }
        for level in &self.levels {
            check_constructor_args(&level.element)?;
        }

        Ok(CompiledMapper {
            root: Arc::clone(self.resolver.root()),
            columns: self.columns,
            levels: self.levels,
            context: self.options.context.clone(),
        })
    }

    fn add_column(&mut self, key: &ColumnKey, definition: &ColumnDefinition) -> Result<Option<usize>> {
        if definition.is_ignored() {
            debug!(column = key.name(), "column ignored");
            return Ok(None);
        }
        let renamed = definition.renamed(key);
        let Some(path) = self.resolver.resolve(renamed.name()) else {
            if definition.is_key() {
                return Ok(None);
            }
            return match self.options.config.unmapped_columns {
                UnmappedColumnPolicy::Strict => Err(MapError::UnmappedColumn {
                    column: key.name().to_string(),
                    type_name: self.resolver.root().name().to_string(),
                }),
                UnmappedColumnPolicy::Lenient => {
                    debug!(column = key.name(), "unmapped column dropped");
                    Ok(None)
                }
            };
        };

        let request = PipelineRequest::new(path.leaf_type())
            .with_source(self.options.source)
            .with_declared(key.declared_type())
            .with_format(definition.format_pattern())
            .with_converter(definition.converter_name())
            .with_default(definition.default_text())
            .with_null_policy(self.options.config.null_policy);
        let pipeline = CellPipeline::build(self.options.registry, self.options.context, &request)
            .map_err(|source| MapError::Conversion {
                column: key.name().to_string(),
                source,
            })?;
        let routing = match (path.steps().last(), path.binding()) {
            (Some(PathStep::Element { .. }), _) => Routing::Element,
            (_, Binding::Constructor { position, .. }) => Routing::Constructor { position },
            (_, Binding::Setter) => Routing::Setter,
        };
        self.columns.push(ColumnPlan {
            key: key.clone(),
            path,
            pipeline,
            routing,
            level: 0,
            position: 0,
        });
        Ok(Some(self.columns.len() - 1))
    }

    /// Pipeline for a key column that feeds no property: text, after the
    /// column's converter and declared type.
    fn key_pipeline(&self, key: &ColumnKey, definition: &ColumnDefinition) -> Result<CellPipeline> {
        let text = ValueType::scalar(ScalarKind::Text);
        let request = PipelineRequest::new(&text)
            .with_declared(key.declared_type())
            .with_converter(definition.converter_name())
            .with_default(definition.default_text());
        CellPipeline::build(self.options.registry, self.options.context, &request).map_err(
            |source| MapError::Conversion {
                column: key.name().to_string(),
                source,
            },
        )
    }

    /// Creates the levels along a column's path, parents first.
    fn assign_levels(&mut self, column: usize) {
        let steps = self.columns[column].path.steps().to_vec();
        let mut level = 0;
        for (k, step) in steps.iter().enumerate() {
            if !step.is_collection() {
                continue;
            }
            let prefix = steps[..=k].to_vec();
            level = match self.level_ids.get(&prefix) {
                Some(&id) => id,
                None => {
                    let id = self.levels.len();
                    let element_type = element_type_at(self.resolver.root(), &prefix)
                        .unwrap_or_else(|| ValueType::object(Arc::clone(self.resolver.root())));
                    let parent_slot = self.levels[level].children.len();
                    self.levels[level].children.push(id);
                    self.levels.push(LevelPlan {
                        path: self.columns[column].path.prefix(k + 1),
                        parent: Some(level),
                        parent_slot,
                        element_type,
                        element: Node::Unset,
                        keys: Vec::new(),
                        columns: Vec::new(),
                        children: Vec::new(),
                    });
                    self.level_ids.insert(prefix, id);
                    id
                }
            };
        }
        let position = self.levels[level].columns.len();
        self.levels[level].columns.push(column);
        self.columns[column].level = level;
        self.columns[column].position = position;
    }

    fn place(&mut self, column: usize) -> Result<()> {
        let steps = self.columns[column].path.steps().to_vec();
        let names: Vec<&str> = self.columns.iter().map(|c| c.key.name()).collect();
        let site = Site {
            column,
            path: self.columns[column].path.as_str(),
            names: &names,
        };
        let mut level = 0;
        let mut start = 0;
        for (k, step) in steps.iter().enumerate() {
            if !step.is_collection() {
                continue;
            }
            let child = self.level_ids[&steps[..=k].to_vec()];
            let plan = &mut self.levels[level];
            insert(
                &mut plan.element,
                &plan.element_type,
                &steps[start..=k],
                Target::Collection(child),
                &site,
            )?;
            level = child;
            start = k + 1;
        }
        let plan = &mut self.levels[level];
        if start == steps.len() {
            return set_cell(&mut plan.element, &site);
        }
        insert(
            &mut plan.element,
            &plan.element_type,
            &steps[start..],
            Target::Cell,
            &site,
        )
    }

    fn attach_key(&mut self, pending: PendingKey) -> Result<()> {
        let owner = match pending.source {
            KeySource::Mapped(c) => self.levels[self.columns[c].level].path.clone(),
            KeySource::Text(_) | KeySource::Raw => String::new(),
        };
        if let KeyScope::AppliesTo(paths) = &pending.scope
            && let Some(missing) = paths
                .iter()
                .find(|p| !self.levels.iter().any(|l| &l.path == *p))
        {
            return Err(MapError::UnknownKeyLevel {
                column: pending.key.name().to_string(),
                path: missing.clone(),
            });
        }
        for level in &mut self.levels {
            if pending.scope.applies_to(&level.path, &owner) {
                level.keys.push(KeyColumn {
                    name: pending.key.name().to_string(),
                    index: pending.key.index(),
                    source: pending.source.clone(),
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
enum Target {
    Cell,
    Collection(usize),
}

/// Where an insertion comes from, for error messages.
struct Site<'a> {
    column: usize,
    path: String,
    names: &'a [&'a str],
}

impl Site<'_> {
    fn duplicate(&self, existing: &Node) -> MapError {
        let first = match existing {
            Node::Cell(other) => self.names.get(*other).copied().unwrap_or_default(),
            _ => "a nested mapping",
        };
        MapError::DuplicateMapping {
            path: self.path.clone(),
            first: first.to_string(),
            second: self.names.get(self.column).copied().unwrap_or_default().to_string(),
        }
    }
}

fn set_cell(node: &mut Node, site: &Site<'_>) -> Result<()> {
    match node {
        Node::Unset => {
            *node = Node::Cell(site.column);
            Ok(())
        }
        existing => Err(site.duplicate(existing)),
    }
}

fn insert(
    node: &mut Node,
    node_type: &ValueType,
    steps: &[PathStep],
    target: Target,
    site: &Site<'_>,
) -> Result<()> {
    if matches!(node, Node::Unset)
        && let Some(meta) = node_type.object_meta()
    {
        *node = Node::Object(ObjectPlan::new(Arc::clone(meta)));
    }
    let Node::Object(plan) = node else {
        return Err(site.duplicate(node));
    };
    let Some((step, rest)) = steps.split_first() else {
        return Ok(());
    };
    let property_type = plan
        .meta
        .property(step.property())
        .map(|p| p.value_type().clone())
        .unwrap_or_else(|| node_type.clone());

    match (*step, target) {
        (PathStep::Element { index: None, .. }, Target::Collection(child)) => {
            plan.fill_mut(step.property(), || Fill::Collection(child));
            Ok(())
        }
        (PathStep::Element { index: None, .. }, Target::Cell) => Err(site.duplicate(&Node::Unset)),
        (PathStep::Element {
            index: Some(n),
            property,
        }, _) => {
            let Fill::Indexed(entries) = plan.fill_mut(property, || Fill::Indexed(Vec::new())) else {
                return Err(site.duplicate(&Node::Unset));
            };
            let at = match entries.iter().position(|(i, _)| *i == n) {
                Some(at) => at,
                None => {
                    entries.push((n, Node::Unset));
                    entries.len() - 1
                }
            };
            let element_type = property_type.element_type().cloned().unwrap_or(property_type);
            descend(&mut entries[at].1, &element_type, rest, target, site)
        }
        (PathStep::Property(property), _) => {
            let Fill::Node(child) = plan.fill_mut(property, || Fill::Node(Node::Unset)) else {
                return Err(site.duplicate(&Node::Unset));
            };
            descend(child, &property_type, rest, target, site)
        }
    }
}

fn descend(
    node: &mut Node,
    node_type: &ValueType,
    rest: &[PathStep],
    target: Target,
    site: &Site<'_>,
) -> Result<()> {
    match (rest.is_empty(), target) {
        (true, Target::Cell) => set_cell(node, site),
        (true, Target::Collection(_)) => Err(site.duplicate(node)),
        (false, _) => insert(node, node_type, rest, target, site),
    }
}

/// Element type of the collection reached by `steps`.
fn element_type_at(root: &Arc<TypeMeta>, steps: &[PathStep]) -> Option<ValueType> {
    let mut meta = Arc::clone(root);
    let mut reached = None;
    for step in steps {
        let value_type = meta.property(step.property())?.value_type().clone();
        let value_type = match step {
            PathStep::Property(_) => value_type,
            PathStep::Element { .. } => value_type.element_type()?.clone(),
        };
        if let Some(next) = value_type.object_meta() {
            meta = Arc::clone(next);
        }
        reached = Some(value_type);
    }
    reached
}

fn check_constructor_args(node: &Node) -> Result<()> {
    let Node::Object(plan) = node else {
        return Ok(());
    };
    for &arg in plan.meta.constructor_args() {
        let Some(property) = plan.meta.property(arg) else {
            continue;
        };
        let filled = plan.fills.iter().any(|(p, _)| *p == arg);
        if !filled && matches!(property.binding(), Binding::Constructor { required: true, .. }) {
            return Err(MapError::MissingConstructorValue {
                type_name: plan.meta.name().to_string(),
                property: property.name().to_string(),
            });
        }
    }
    for (_, fill) in &plan.fills {
        match fill {
            Fill::Node(child) => check_constructor_args(child)?,
            Fill::Indexed(entries) => {
                for (_, child) in entries {
                    check_constructor_args(child)?;
                }
            }
            Fill::Collection(_) => {}
        }
    }
    Ok(())
}
