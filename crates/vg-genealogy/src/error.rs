//! Error types for the virus genealogy.

use std::fmt::Debug;

/// Errors that can occur during genealogy operations.
///
/// Every variant is raised before the operation mutates anything, so a
/// failed call leaves the genealogy exactly as it was.
///
/// `NotFound`, `AlreadyExists` and `CannotRemoveStem` are the failure modes
/// of the public operations. `NoParents` and `CycleDetected` only refuse
/// calls that would break a structural invariant: every non-stem virus has
/// a parent, the stem has none, and the graph stays acyclic.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenealogyError<Id: Debug> {
    /// A referenced virus was not found in the genealogy.
    #[error("virus not found: {0:?}")]
    NotFound(Id),

    /// Attempted to create a virus with an ID that already exists.
    #[error("virus already created: {0:?}")]
    AlreadyExists(Id),

    /// Attempted to remove the stem virus.
    #[error("cannot remove stem virus {0:?}")]
    CannotRemoveStem(Id),

    /// Attempted to create a virus without any parent, which would leave it
    /// unreachable from the stem.
    #[error("virus {0:?} must descend from at least one parent")]
    NoParents(Id),

    /// The requested edge would close a cycle or give the stem a parent.
    #[error("cycle detected: {parent:?} already descends from {child:?}")]
    CycleDetected {
        /// The virus that would gain a parent.
        child: Id,
        /// The would-be parent, already reachable from `child`.
        parent: Id,
    },
}

/// Convenience alias for genealogy results.
pub type GenealogyResult<T, Id> = Result<T, GenealogyError<Id>>;

/// A structural defect reported by [`Genealogy::validate`].
///
/// The public operations never produce one; `validate` exists so tests and
/// harnesses can assert the invariants after every step.
///
/// [`Genealogy::validate`]: crate::Genealogy::validate
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Violation<Id: Debug> {
    /// The stem is missing from the arena.
    #[error("stem {0:?} is missing")]
    MissingStem(Id),

    /// The stem has acquired a parent.
    #[error("stem {stem:?} has parent {parent:?}")]
    StemHasParent {
        /// The stem.
        stem: Id,
        /// The offending parent.
        parent: Id,
    },

    /// A record references a slot that holds no record.
    #[error("virus {0:?} references a vacated slot")]
    DanglingEdge(Id),

    /// `parent` lists `child` (or vice versa) without the reverse link.
    #[error("asymmetric edge {parent:?} -> {child:?}")]
    AsymmetricEdge {
        /// Parent side of the edge.
        parent: Id,
        /// Child side of the edge.
        child: Id,
    },

    /// The identifier index and the arena disagree.
    #[error("index entry for {0:?} does not match its record")]
    IndexMismatch(Id),

    /// A non-stem virus cannot be reached from the stem.
    #[error("virus {0:?} is not reachable from the stem")]
    Unreachable(Id),
}
