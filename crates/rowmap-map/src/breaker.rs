//! Break detection for one nesting level.

use rowmap_model::Value;

/// Compares one level's key values against the previous row's.
///
/// A level without key columns either breaks on every row (it has no
/// nested collections, so each row is its own object) or never breaks
/// after the first row (every row is appended below it).
#[derive(Debug, Clone, PartialEq)]
pub struct BreakDetector {
    previous: Option<Vec<Value>>,
    breaks_without_keys: bool,
}

impl BreakDetector {
    pub fn new(breaks_without_keys: bool) -> Self {
        Self {
            previous: None,
            breaks_without_keys,
        }
    }

    /// Records `keys` and reports whether they start a new object.
    ///
    /// Values compare by equality; two nulls are equal.
    pub fn observe(&mut self, keys: Vec<Value>) -> bool {
        let Some(previous) = self.previous.replace(keys) else {
            return true;
        };
        match self.previous.as_deref() {
            Some([]) | None => self.breaks_without_keys,
            Some(current) => previous != current,
        }
    }

    /// Forgets the previous row, e.g. after the parent level broke.
    pub fn reset(&mut self) {
        self.previous = None;
    }

    pub fn previous(&self) -> Option<&[Value]> {
        self.previous.as_deref()
    }
}
