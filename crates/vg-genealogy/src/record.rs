//! Per-node state of the genealogy arena.
//!
//! Each [`Record`] owns its payload and refers to its neighbours only by
//! [`Slot`]. Slots are plain indices into the arena, so parent and child
//! links never own anything and a record can be dropped without chasing
//! pointers.

use std::collections::BTreeSet;
use std::fmt;

/// Stable position of a record in the genealogy arena.
///
/// A slot is valid until the record it addresses is removed; vacated slots
/// are recycled by later creations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Slot(usize);

impl Slot {
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }

    /// Position in the arena.
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A node in the genealogy.
#[derive(Clone, Debug)]
pub(crate) struct Record<Id, V> {
    /// Identifier, immutable after creation.
    pub(crate) id: Id,
    /// Payload built from `id` at creation time.
    pub(crate) virus: V,
    /// Direct predecessors. Always empty for the stem.
    pub(crate) parents: BTreeSet<Slot>,
    /// Direct successors.
    pub(crate) children: BTreeSet<Slot>,
}

impl<Id, V> Record<Id, V> {
    /// A record with no edges yet.
    pub(crate) fn new(id: Id, virus: V) -> Self {
        Self {
            id,
            virus,
            parents: BTreeSet::new(),
            children: BTreeSet::new(),
        }
    }

    /// Returns `true` if the record has no parents.
    pub(crate) fn is_orphan(&self) -> bool {
        self.parents.is_empty()
    }

    pub(crate) fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}
