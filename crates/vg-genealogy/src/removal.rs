//! Cascading removal, split into a read-only discovery phase and an
//! infallible commit phase.
//!
//! [`discover`] walks the arena from the target and decides, without
//! mutating anything, which records must go and which surviving edges must
//! be unlinked. The result is a [`Staged`] removal that
//! [`Genealogy::remove`](crate::Genealogy::remove) applies in one pass, and
//! a [`RemovalPlan`] describing the same change in terms of identifiers.

use std::collections::{HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::record::{Record, Slot};

/// The complete effect of removing one virus.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemovalPlan<Id> {
    /// The virus whose removal was requested.
    pub target: Id,
    /// Every virus that disappears, target first, each parent before the
    /// children it drags along.
    pub removed: Vec<Id>,
    /// Edges `(parent, child)` joining a removed virus to a survivor.
    pub severed: Vec<(Id, Id)>,
}

impl<Id: PartialEq> RemovalPlan<Id> {
    /// Number of viruses removed, including the target.
    pub fn len(&self) -> usize {
        self.removed.len()
    }

    /// Always `false`: a plan removes at least its target.
    pub fn is_empty(&self) -> bool {
        self.removed.is_empty()
    }

    /// Viruses removed only because they lost their last parent.
    pub fn cascade(&self) -> &[Id] {
        self.removed.get(1..).unwrap_or_default()
    }

    /// Returns `true` if `id` is removed by this plan.
    pub fn removes(&self, id: &Id) -> bool {
        self.removed.contains(id)
    }
}

/// A removal expressed in arena slots, ready to commit.
#[derive(Debug, Default)]
pub(crate) struct Staged {
    /// Slots to vacate, in discovery order.
    pub(crate) removed: Vec<Slot>,
    /// Edges `(parent, child)` with exactly one end in `removed`.
    pub(crate) severed: Vec<(Slot, Slot)>,
    doomed: HashSet<Slot>,
}

impl Staged {
    /// Returns `true` if `slot` is vacated by this removal.
    pub(crate) fn removes(&self, slot: Slot) -> bool {
        self.doomed.contains(&slot)
    }

    /// Translate slots into identifiers for the public plan.
    pub(crate) fn to_plan<Id: Clone, V>(&self, slots: &[Option<Record<Id, V>>]) -> Option<RemovalPlan<Id>> {
        let id_of = |slot: Slot| lookup(slots, slot).map(|r| r.id.clone());
        let removed = self
            .removed
            .iter()
            .map(|&slot| id_of(slot))
            .collect::<Option<Vec<_>>>()?;
        let severed = self
            .severed
            .iter()
            .map(|&(parent, child)| Some((id_of(parent)?, id_of(child)?)))
            .collect::<Option<Vec<_>>>()?;
        Some(RemovalPlan {
            target: removed.first()?.clone(),
            removed,
            severed,
        })
    }
}

fn lookup<Id, V>(slots: &[Option<Record<Id, V>>], slot: Slot) -> Option<&Record<Id, V>> {
    slots.get(slot.index()).and_then(Option::as_ref)
}

/// Compute everything removing `target` takes down with it.
///
/// A child joins the removal set the moment its count of parents outside
/// the set reaches zero. Children are only examined after the parent that
/// decremented them was recorded, so a grandchild is judged against its
/// parent's final fate. `stem` is never removed.
pub(crate) fn discover<Id, V>(slots: &[Option<Record<Id, V>>], target: Slot, stem: Slot) -> Staged {
    let mut staged = Staged::default();
    staged.doomed.insert(target);
    staged.removed.push(target);

    let mut live_parents: HashMap<Slot, usize> = HashMap::new();
    let mut queue = VecDeque::from([target]);

    while let Some(current) = queue.pop_front() {
        let Some(record) = lookup(slots, current) else {
            continue;
        };
        for &child in &record.children {
            // `connect` keeps the stem parentless, so it is never a child
            // here; the explicit marker still bars it from the cascade.
            if child == stem || staged.doomed.contains(&child) {
                continue;
            }
            let left = live_parents
                .entry(child)
                .or_insert_with(|| lookup(slots, child).map_or(0, |r| r.parents.len()));
            *left = left.saturating_sub(1);
            if *left == 0 {
                trace!(child = %child, parent = %current, "cascade reaches child");
                staged.doomed.insert(child);
                staged.removed.push(child);
                queue.push_back(child);
            }
        }
    }

    for &slot in &staged.removed {
        let Some(record) = lookup(slots, slot) else {
            continue;
        };
        for &parent in &record.parents {
            if !staged.doomed.contains(&parent) {
                staged.severed.push((parent, slot));
            }
        }
        for &child in &record.children {
            if !staged.doomed.contains(&child) {
                staged.severed.push((slot, child));
            }
        }
    }

    staged
}
