//! Field-error handlers, applied to every cell of a session.

use std::fmt;
use std::sync::{Arc, RwLock};

use tracing::warn;

use rowmap_convert::CellError;
use rowmap_model::FieldErrorStrategy;

use crate::error::{MapError, Result};

/// A cell that failed to read or convert.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldError {
    pub column: String,
    pub index: usize,
    /// 1-based row number within the session.
    pub row: u64,
    pub error: CellError,
}

impl From<FieldError> for MapError {
    fn from(value: FieldError) -> Self {
        MapError::Field {
            column: value.column,
            row: value.row,
            source: value.error,
        }
    }
}

/// Decides what happens when a cell fails.
///
/// `Ok(())` substitutes the target's default and continues with the next
/// field; `Err` aborts the current row.
pub trait FieldErrorHandler: Send + fmt::Debug {
    fn handle(&mut self, error: FieldError) -> Result<()>;
}

/// Re-raises every error.
#[derive(Debug, Clone, Copy, Default)]
pub struct RethrowHandler;

impl FieldErrorHandler for RethrowHandler {
    fn handle(&mut self, error: FieldError) -> Result<()> {
        Err(error.into())
    }
}

/// Records errors and lets mapping continue with defaults.
///
/// Clones share the same record list.
#[derive(Debug, Clone, Default)]
pub struct RecordingHandler {
    errors: Arc<RwLock<Vec<FieldError>>>,
}

impl RecordingHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn errors(&self) -> Vec<FieldError> {
        self.errors.read().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.errors.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FieldErrorHandler for RecordingHandler {
    fn handle(&mut self, error: FieldError) -> Result<()> {
        warn!(
            column = %error.column,
            row = error.row,
            error = %error.error,
            "field error recorded, using default"
        );
        if let Ok(mut errors) = self.errors.write() {
            errors.push(error);
        }
        Ok(())
    }
}

/// Handler for a configured strategy.
pub fn handler_for(strategy: FieldErrorStrategy) -> Box<dyn FieldErrorHandler> {
    match strategy {
        FieldErrorStrategy::Rethrow => Box::new(RethrowHandler),
        FieldErrorStrategy::Record => Box::new(RecordingHandler::new()),
    }
}
