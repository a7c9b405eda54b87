//! Short entity identifiers and their allocation.
//!
//! Every named entity in a layout (locality group, family, column) carries
//! a positive integer ID used as its short on-disk identifier. IDs are
//! scoped to their siblings: locality groups across the table, families
//! within their locality group, columns within their family.

use std::collections::BTreeSet;
use std::fmt;

/// Positive-integer short identifier for an entity within its scope.
/// Stable across a table's lifetime: once assigned, an entity keeps its ID
/// through every subsequent layout update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ColumnId(i32);

impl ColumnId {
    /// Wrap a raw ID. Returns `None` unless the value is positive.
    pub fn new(id: i32) -> Option<Self> {
        (id > 0).then_some(Self(id))
    }

    pub fn get(self) -> i32 {
        self.0
    }
}

impl fmt::Display for ColumnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Deterministic smallest-free-ID assignment for one sibling scope.
///
/// Builders first `reserve` every ID that survives from the prior layout
/// or was supplied explicitly, then `assign` the remaining entities in
/// declaration order. The cursor never rescans below itself; that is sound
/// because all reserves happen before the first assign in every build.
#[derive(Debug)]
pub(crate) struct IdAllocator {
    claimed: BTreeSet<i32>,
    cursor: i32,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self {
            claimed: BTreeSet::new(),
            cursor: 1,
        }
    }

    /// Claim an explicitly-supplied ID. Returns `false` if a sibling
    /// already holds it; the caller reports that as a duplicate-ID error.
    pub fn reserve(&mut self, id: ColumnId) -> bool {
        self.claimed.insert(id.get())
    }

    /// Assign the smallest positive ID no sibling holds yet.
    pub fn assign(&mut self) -> ColumnId {
        while self.claimed.contains(&self.cursor) {
            self.cursor += 1;
        }
        self.claimed.insert(self.cursor);
        ColumnId(self.cursor)
    }
}
