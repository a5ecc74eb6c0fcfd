//! Row-by-row assembly of object graphs.
//!
//! A session owns one delayed setter per mapped column and one break
//! detector per level. Every pushed row is read into the setters first;
//! key columns are then compared level by level, parents before children.
//! A level that breaks closes its open element (children first, each
//! appended to its parent's open element) and opens a new one from the
//! current row. A closed root element is a finished object.

use std::mem;
use std::sync::Arc;

use tracing::trace;

use rowmap_model::{Binding, Value, ValueType};

use crate::breaker::BreakDetector;
use crate::error::{MapError, Result};
use crate::handler::{FieldError, FieldErrorHandler};
use crate::instantiate::Instantiator;
use crate::plan::{CompiledMapper, Fill, KeyColumn, KeySource, LevelPlan, Node, ObjectPlan};
use crate::row::Row;
use crate::setter::DelayedCellSetter;

/// Where a session stands within the current row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AssemblyState {
    /// Cells of the current row are being read.
    #[default]
    Accumulating,
    /// Every cell of the row is buffered; keys not yet compared.
    RowComplete,
    /// The row was applied to the open elements.
    ObjectReady,
    /// A key changed and open elements are being closed.
    Break,
}

/// Open element of one level.
#[derive(Debug, Clone, Default)]
struct Frame {
    /// Values of the level's columns, by position.
    values: Vec<Value>,
    /// Closed elements of each child level, by parent slot.
    children: Vec<Vec<Value>>,
}

/// Stateful mapping of consecutive rows through one compiled mapper.
#[derive(Debug)]
pub struct MappingSession {
    mapper: Arc<CompiledMapper>,
    instantiator: Arc<dyn Instantiator>,
    handler: Box<dyn FieldErrorHandler>,
    setters: Vec<DelayedCellSetter>,
    /// Raw cell of the current row was null, per column.
    null_cells: Vec<bool>,
    detectors: Vec<BreakDetector>,
    frames: Vec<Option<Frame>>,
    state: AssemblyState,
    rows: u64,
    finished: bool,
}

impl MappingSession {
    pub fn new(
        mapper: Arc<CompiledMapper>,
        instantiator: Arc<dyn Instantiator>,
        handler: Box<dyn FieldErrorHandler>,
    ) -> Self {
        let columns = mapper.columns().len();
        let detectors = mapper
            .levels()
            .iter()
            .map(|level| BreakDetector::new(level.breaks_without_keys()))
            .collect();
        let frames = vec![None; mapper.levels().len()];
        Self {
            mapper,
            instantiator,
            handler,
            setters: vec![DelayedCellSetter::new(); columns],
            null_cells: vec![false; columns],
            detectors,
            frames,
            state: AssemblyState::default(),
            rows: 0,
            finished: false,
        }
    }

    pub fn mapper(&self) -> &Arc<CompiledMapper> {
        &self.mapper
    }

    pub fn state(&self) -> AssemblyState {
        self.state
    }

    /// Rows pushed so far.
    pub fn rows(&self) -> u64 {
        self.rows
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Applies one row. Returns the root object the row completed, if any.
    pub fn push_row<R: Row + ?Sized>(&mut self, row: &R) -> Result<Option<Value>> {
        if self.finished {
            return Err(MapError::SessionFinished);
        }
        self.state = AssemblyState::Accumulating;
        self.rows += 1;
        let mapper = Arc::clone(&self.mapper);

        for (idx, column) in mapper.columns().iter().enumerate() {
            let index = column.key().index();
            let cell = row.cell(index).ok_or_else(|| MapError::MissingCell {
                row: self.rows,
                column: column.key().name().to_string(),
                index,
                len: row.len(),
            })?;
            self.null_cells[idx] = cell.is_null();
            if let Err(error) = self.setters[idx].set(column.pipeline(), &cell, mapper.context()) {
                self.handler.handle(FieldError {
                    column: column.key().name().to_string(),
                    index,
                    row: self.rows,
                    error,
                })?;
                self.setters[idx].set_value(column.pipeline().target().default_value());
            }
        }
        self.state = AssemblyState::RowComplete;

        let levels = mapper.levels();
        let mut broken = vec![false; levels.len()];
        for (id, level) in levels.iter().enumerate() {
            if level.parent().is_some_and(|parent| broken[parent]) {
                self.detectors[id].reset();
            }
            let keys = level
                .keys()
                .iter()
                .map(|key| self.key_value(row, key))
                .collect::<Result<Vec<_>>>()?;
            broken[id] = self.detectors[id].observe(keys);
        }

        let mut emitted = None;
        if broken.contains(&true) {
            self.state = AssemblyState::Break;
            for id in (0..levels.len()).rev() {
                if broken[id]
                    && let Some(value) = self.close(id)?
                {
                    emitted = Some(value);
                }
            }
            for (id, level) in levels.iter().enumerate() {
                if broken[id] {
                    self.open(id, level);
                }
            }
            trace!(row = self.rows, emitted = emitted.is_some(), "break");
        }
        self.state = AssemblyState::ObjectReady;
        Ok(emitted)
    }

    /// Closes every open element and returns the last root object.
    ///
    /// Further calls return `None`.
    pub fn finish(&mut self) -> Result<Option<Value>> {
        if self.finished {
            return Ok(None);
        }
        self.finished = true;
        let mut emitted = None;
        for id in (0..self.frames.len()).rev() {
            if let Some(value) = self.close(id)? {
                emitted = Some(value);
            }
        }
        Ok(emitted)
    }

    /// Comparison value of one key column for the current row. Mapped
    /// columns compare their converted value, so `01` and `1` are one key.
    fn key_value<R: Row + ?Sized>(&mut self, row: &R, key: &KeyColumn) -> Result<Value> {
        let pipeline = match &key.source {
            KeySource::Mapped(column) => {
                return Ok(self.setters[*column].peek_value().unwrap_or_default());
            }
            KeySource::Text(pipeline) => Some(pipeline),
            KeySource::Raw => None,
        };
        let cell = row.cell(key.index).ok_or_else(|| MapError::MissingCell {
            row: self.rows,
            column: key.name.clone(),
            index: key.index,
            len: row.len(),
        })?;
        let Some(pipeline) = pipeline else {
            return Ok(cell.to_value());
        };
        match pipeline.read(&cell, self.mapper.context()) {
            Ok(value) => Ok(value),
            Err(error) => {
                self.handler.handle(FieldError {
                    column: key.name.clone(),
                    index: key.index,
                    row: self.rows,
                    error,
                })?;
                Ok(Value::Null)
            }
        }
    }

    fn open(&mut self, id: usize, level: &LevelPlan) {
        let parent_open = level.parent().is_none_or(|parent| self.frames[parent].is_some());
        let all_null = !level.columns().is_empty()
            && level.columns().iter().all(|&column| self.null_cells[column]);
        let values: Vec<Value> = level
            .columns()
            .iter()
            .map(|&column| self.setters[column].consume_value().unwrap_or_default())
            .collect();
        self.frames[id] = if !parent_open || (level.parent().is_some() && all_null) {
            None
        } else {
            Some(Frame {
                values,
                children: vec![Vec::new(); level.children().len()],
            })
        };
    }

    fn close(&mut self, id: usize) -> Result<Option<Value>> {
        let Some(frame) = self.frames[id].take() else {
            return Ok(None);
        };
        let mapper = Arc::clone(&self.mapper);
        let level = &mapper.levels()[id];
        let value = Assembler {
            mapper: &mapper,
            instantiator: self.instantiator.as_ref(),
            frame,
        }
        .build(level)?;
        match level.parent() {
            Some(parent) => {
                if let Some(open) = self.frames[parent].as_mut() {
                    open.children[level.parent_slot].push(value);
                }
                Ok(None)
            }
            None => Ok(Some(value)),
        }
    }
}

/// Builds one closed element from its frame.
struct Assembler<'a> {
    mapper: &'a CompiledMapper,
    instantiator: &'a dyn Instantiator,
    frame: Frame,
}

impl Assembler<'_> {
    fn build(mut self, level: &LevelPlan) -> Result<Value> {
        self.node(&level.element, &level.element_type)
    }

    fn node(&mut self, node: &Node, value_type: &ValueType) -> Result<Value> {
        match node {
            Node::Unset => Ok(value_type.default_value()),
            Node::Cell(column) => {
                let position = self.mapper.columns[*column].position;
                Ok(self
                    .frame
                    .values
                    .get_mut(position)
                    .map(mem::take)
                    .unwrap_or_default())
            }
            Node::Object(plan) => self.object(plan),
        }
    }

    fn object(&mut self, plan: &ObjectPlan) -> Result<Value> {
        let meta = &plan.meta;
        let mut args: Vec<Value> = meta
            .constructor_args()
            .iter()
            .map(|&p| meta.property(p).map_or(Value::Null, |p| p.value_type().default_value()))
            .collect();
        let mut deferred = Vec::new();

        for (property, fill) in &plan.fills {
            let Some(target) = meta.property(*property) else {
                continue;
            };
            let value = match fill {
                Fill::Node(node) => self.node(node, target.value_type())?,
                Fill::Indexed(entries) => {
                    let element = target
                        .value_type()
                        .element_type()
                        .unwrap_or(target.value_type());
                    let len = entries.iter().map(|(i, _)| i + 1).max().unwrap_or(0);
                    let mut list = vec![element.default_value(); len];
                    for (i, node) in entries {
                        list[*i] = self.node(node, element)?;
                    }
                    Value::List(list)
                }
                Fill::Collection(child) => {
                    let slot = self.mapper.levels[*child].parent_slot;
                    Value::List(
                        self.frame
                            .children
                            .get_mut(slot)
                            .map(mem::take)
                            .unwrap_or_default(),
                    )
                }
            };
            match target.binding() {
                Binding::Constructor { position, .. } => {
                    if let Some(arg) = args.get_mut(position) {
                        *arg = value;
                    }
                }
                Binding::Setter => deferred.push((*property, value)),
            }
        }

        let mut record = self.instantiator.instantiate(meta, args)?;
        for (property, value) in deferred {
            self.instantiator.assign(&mut record, property, value)?;
        }
        Ok(Value::Record(record))
    }
}
