//! Row sources.

use rowmap_convert::Cell;
use rowmap_model::Value;

/// One row of cells, addressed by column index.
pub trait Row {
    fn len(&self) -> usize;

    /// The cell at `index`, `None` past the end of the row.
    fn cell(&self, index: usize) -> Option<Cell<'_>>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<R: Row + ?Sized> Row for &R {
    fn len(&self) -> usize {
        (**self).len()
    }

    fn cell(&self, index: usize) -> Option<Cell<'_>> {
        (**self).cell(index)
    }
}

impl Row for [&str] {
    fn len(&self) -> usize {
        <[&str]>::len(self)
    }

    fn cell(&self, index: usize) -> Option<Cell<'_>> {
        self.get(index).map(|s| Cell::Text(s))
    }
}

impl Row for [String] {
    fn len(&self) -> usize {
        <[String]>::len(self)
    }

    fn cell(&self, index: usize) -> Option<Cell<'_>> {
        self.get(index).map(|s| Cell::Text(s))
    }
}

/// Typed driver rows.
impl Row for [Value] {
    fn len(&self) -> usize {
        <[Value]>::len(self)
    }

    fn cell(&self, index: usize) -> Option<Cell<'_>> {
        self.get(index).map(Cell::from_value)
    }
}

impl<T> Row for Vec<T>
where
    [T]: Row,
{
    fn len(&self) -> usize {
        Vec::len(self)
    }

    fn cell(&self, index: usize) -> Option<Cell<'_>> {
        self.as_slice().cell(index)
    }
}

impl<T, const N: usize> Row for [T; N]
where
    [T]: Row,
{
    fn len(&self) -> usize {
        N
    }

    fn cell(&self, index: usize) -> Option<Cell<'_>> {
        self.as_slice().cell(index)
    }
}
