//! The payload contract stored at every genealogy node.
//!
//! A [`Virus`] is opaque to the genealogy: it is built once from its
//! identifier when the node is created and is otherwise only handed back to
//! callers. Identifier clones are assumed not to fail.

use std::fmt::Debug;
use std::hash::Hash;

/// A value that can live in a [`Genealogy`](crate::Genealogy).
pub trait Virus {
    /// Identifier type, unique within a genealogy.
    type Id: Clone + Eq + Hash + Debug;

    /// Construct the payload for a freshly created node.
    fn from_id(id: &Self::Id) -> Self;

    /// The identifier this payload was built from.
    fn id(&self) -> &Self::Id;
}

/// Minimal payload that only remembers its identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SampleVirus<Id> {
    id: Id,
}

impl<Id> SampleVirus<Id> {
    /// Create a sample virus directly.
    pub fn new(id: Id) -> Self {
        Self { id }
    }
}

impl<Id: Clone + Eq + Hash + Debug> Virus for SampleVirus<Id> {
    type Id = Id;

    fn from_id(id: &Id) -> Self {
        Self::new(id.clone())
    }

    fn id(&self) -> &Id {
        &self.id
    }
}
