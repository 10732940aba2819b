//! Value container for a single leaf field
//!
//! A leaf accumulates every value assigned to its path while one document is
//! being built. Order of first occurrence is kept and duplicates are dropped,
//! so repeated join rows do not multiply scalar fields.

use crate::types::Cell;

/// Ordered, duplicate-free values of one field
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Values {
    values: Vec<Cell>,
}

impl Values {
    pub fn new() -> Self {
        Values { values: Vec::new() }
    }

    pub fn single(value: Cell) -> Self {
        Values {
            values: vec![value],
        }
    }

    /// Fold `value` into an existing container (or a fresh one).
    ///
    /// With `expand` set, a non-null value is split on `,` and every piece is
    /// appended as text.
    pub fn append(existing: Option<Values>, value: Cell, expand: bool) -> Values {
        let mut values = existing.unwrap_or_default();
        if expand && !value.is_null() {
            for piece in value.to_string().split(',') {
                values.push(Cell::Text(piece.to_string()));
            }
        } else {
            values.push(value);
        }
        values
    }

    /// Add one candidate, keeping the container duplicate-free and null-free
    /// once it holds a real value.
    pub fn push(&mut self, value: Cell) {
        if self.values.contains(&value) {
            return;
        }
        if self.values.len() == 1 && self.values[0].is_null() {
            // a lone null is a placeholder, not a value
            self.values[0] = value;
            return;
        }
        if value.is_null() && !self.values.is_empty() {
            return;
        }
        self.values.push(value);
    }

    pub fn is_null(&self) -> bool {
        match self.values.as_slice() {
            [] => true,
            [only] => only.is_null(),
            _ => false,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn as_slice(&self) -> &[Cell] {
        &self.values
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Cell> {
        self.values.iter()
    }
}

impl<'a> IntoIterator for &'a Values {
    type Item = &'a Cell;
    type IntoIter = std::slice::Iter<'a, Cell>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.iter()
    }
}
