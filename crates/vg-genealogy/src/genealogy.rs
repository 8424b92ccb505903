//! The genealogy container and its mutation algorithms.
//!
//! [`Genealogy`] keeps every record in an arena of [`Slot`]s and an
//! identifier index on the side. Edges are stored twice, as the child's
//! parent set and the parent's child set, and every public operation keeps
//! the two in step.
//!
//! # Invariants
//!
//! - The stem is always present and its parent set is always empty.
//! - Every non-stem virus has at least one parent, so every virus is
//!   reachable from the stem.
//! - Edges are symmetric: `p` is a parent of `c` iff `c` is a child of `p`.
//! - The graph is acyclic.
//!
//! Each mutating operation checks all of its preconditions before its first
//! write and then runs a commit sequence that cannot fail. A call that
//! returns an error has therefore changed nothing.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use tracing::debug;

use crate::error::{GenealogyError, GenealogyResult, Violation};
use crate::record::{Record, Slot};
use crate::removal::{self, RemovalPlan, Staged};
use crate::virus::Virus;

type Result<T, V> = GenealogyResult<T, <V as Virus>::Id>;

/// Which edge set a traversal follows.
#[derive(Clone, Copy, Debug)]
enum Direction {
    Up,
    Down,
}

impl Direction {
    fn edges<Id, V>(self, record: &Record<Id, V>) -> &BTreeSet<Slot> {
        match self {
            Self::Up => &record.parents,
            Self::Down => &record.children,
        }
    }
}

/// A multi-parent genealogy of viruses rooted at a single stem.
#[derive(Clone, Debug)]
pub struct Genealogy<V: Virus> {
    /// Arena of records; `None` marks a vacated slot.
    slots: Vec<Option<Record<V::Id, V>>>,
    /// Identifier index into `slots`.
    index: HashMap<V::Id, Slot>,
    /// Vacated slots, reused by later creations.
    free: Vec<Slot>,
    /// Slot of the stem virus. Never vacated.
    stem: Slot,
    stem_id: V::Id,
}

impl<V: Virus> Genealogy<V> {
    /// Create a genealogy holding only the stem virus.
    pub fn new(stem_id: V::Id) -> Self {
        let stem = Slot::new(0);
        let record = Record::new(stem_id.clone(), V::from_id(&stem_id));
        let mut index = HashMap::new();
        index.insert(stem_id.clone(), stem);
        debug!(stem = ?stem_id, "genealogy created");
        Self {
            slots: vec![Some(record)],
            index,
            free: Vec::new(),
            stem,
            stem_id,
        }
    }

    /// Identifier of the stem virus.
    pub fn stem_id(&self) -> &V::Id {
        &self.stem_id
    }

    /// Number of viruses, the stem included.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Always `false`: the stem cannot be removed.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Returns `true` if a virus with this identifier exists.
    pub fn exists(&self, id: &V::Id) -> bool {
        self.index.contains_key(id)
    }

    /// Identifiers of all viruses, in arena order.
    pub fn ids(&self) -> impl Iterator<Item = &V::Id> + '_ {
        self.slots.iter().flatten().map(|record| &record.id)
    }

    // ---------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------

    /// Direct predecessors of `id`.
    pub fn parents_of(&self, id: &V::Id) -> Result<Vec<V::Id>, V> {
        let record = self.lookup(id)?;
        Ok(self.ids_of(&record.parents))
    }

    /// Direct successors of `id`.
    pub fn children_of(&self, id: &V::Id) -> Result<Vec<V::Id>, V> {
        let record = self.lookup(id)?;
        Ok(self.ids_of(&record.children))
    }

    /// The payload stored for `id`.
    pub fn get(&self, id: &V::Id) -> Result<&V, V> {
        self.lookup(id).map(|record| &record.virus)
    }

    /// Mutable access to the payload stored for `id`.
    ///
    /// The payload is opaque to the genealogy; changing it never affects
    /// the graph.
    pub fn get_mut(&mut self, id: &V::Id) -> Result<&mut V, V> {
        let slot = self.slot_of(id)?;
        self.record_mut(slot)
            .map(|record| &mut record.virus)
            .ok_or_else(|| GenealogyError::NotFound(id.clone()))
    }

    /// All transitive predecessors of `id`, nearest first.
    pub fn ancestors(&self, id: &V::Id) -> Result<Vec<V::Id>, V> {
        let slot = self.slot_of(id)?;
        Ok(self.walk(slot, Direction::Up).into_iter().filter_map(|s| self.id_at(s)).collect())
    }

    /// All transitive successors of `id`, nearest first.
    pub fn descendants(&self, id: &V::Id) -> Result<Vec<V::Id>, V> {
        let slot = self.slot_of(id)?;
        Ok(self.walk(slot, Direction::Down).into_iter().filter_map(|s| self.id_at(s)).collect())
    }

    // ---------------------------------------------------------------
    // Creation and edges
    // ---------------------------------------------------------------

    /// Create `id` as a child of a single existing virus.
    pub fn create(&mut self, id: V::Id, parent_id: V::Id) -> Result<(), V> {
        self.create_with_parents(id, [parent_id])
    }

    /// Create `id` as a child of every virus in `parent_ids`.
    ///
    /// Fails with [`GenealogyError::AlreadyExists`] if `id` is taken, checked
    /// first, then with [`GenealogyError::NotFound`] for the first unknown
    /// parent and [`GenealogyError::NoParents`] if no parent was given.
    /// Duplicate parents collapse into one edge.
    pub fn create_with_parents<I>(&mut self, id: V::Id, parent_ids: I) -> Result<(), V>
    where
        I: IntoIterator<Item = V::Id>,
    {
        if self.exists(&id) {
            return Err(GenealogyError::AlreadyExists(id));
        }

        let mut parents = BTreeSet::new();
        for parent_id in parent_ids {
            parents.insert(self.slot_of(&parent_id)?);
        }
        if parents.is_empty() {
            return Err(GenealogyError::NoParents(id));
        }

        let virus = V::from_id(&id);
        let mut record = Record::new(id.clone(), virus);
        record.parents.clone_from(&parents);
        let slot = self.allocate(record);
        for &parent in &parents {
            if let Some(parent_record) = self.record_mut(parent) {
                parent_record.children.insert(slot);
            }
        }

        debug!(id = ?id, parents = parents.len(), slot = %slot, "created virus");
        self.index.insert(id, slot);
        Ok(())
    }

    /// Add the edge `parent_id -> child_id`.
    ///
    /// Connecting an existing edge is a no-op. Fails with
    /// [`GenealogyError::CycleDetected`] if `parent_id` already descends
    /// from `child_id`; this covers self-loops and giving the stem a parent.
    pub fn connect(&mut self, child_id: &V::Id, parent_id: &V::Id) -> Result<(), V> {
        let child = self.slot_of(child_id)?;
        let parent = self.slot_of(parent_id)?;

        if self.record(child).is_some_and(|r| r.parents.contains(&parent)) {
            return Ok(());
        }
        if self.reaches(child, parent) {
            return Err(GenealogyError::CycleDetected {
                child: child_id.clone(),
                parent: parent_id.clone(),
            });
        }

        if let Some(record) = self.record_mut(child) {
            record.parents.insert(parent);
        }
        if let Some(record) = self.record_mut(parent) {
            record.children.insert(child);
        }

        debug!(child = ?child_id, parent = ?parent_id, "connected viruses");
        Ok(())
    }

    // ---------------------------------------------------------------
    // Removal
    // ---------------------------------------------------------------

    /// Describe what [`remove`](Self::remove) would do, without doing it.
    pub fn plan_removal(&self, id: &V::Id) -> Result<RemovalPlan<V::Id>, V> {
        let staged = self.stage_removal(id)?;
        staged
            .to_plan(&self.slots)
            .ok_or_else(|| GenealogyError::NotFound(id.clone()))
    }

    /// Remove `id` and every descendant left without a parent.
    ///
    /// Fails with [`GenealogyError::CannotRemoveStem`] for the stem, checked
    /// first, and [`GenealogyError::NotFound`] for unknown viruses. The
    /// whole cascade is computed before the first record is touched, so
    /// the removal is all-or-nothing. Returns the plan that was applied.
    pub fn remove(&mut self, id: &V::Id) -> Result<RemovalPlan<V::Id>, V> {
        let staged = self.stage_removal(id)?;
        let plan = staged
            .to_plan(&self.slots)
            .ok_or_else(|| GenealogyError::NotFound(id.clone()))?;

        self.commit_removal(&staged);

        debug!(
            id = ?id,
            cascade = plan.cascade().len(),
            severed = plan.severed.len(),
            "removed virus"
        );
        Ok(plan)
    }

    fn stage_removal(&self, id: &V::Id) -> Result<Staged, V> {
        if *id == self.stem_id {
            return Err(GenealogyError::CannotRemoveStem(id.clone()));
        }
        let target = self.slot_of(id)?;
        Ok(removal::discover(&self.slots, target, self.stem))
    }

    fn commit_removal(&mut self, staged: &Staged) {
        for &(parent, child) in &staged.severed {
            if staged.removes(parent) {
                if let Some(record) = self.record_mut(child) {
                    record.parents.remove(&parent);
                }
            } else if let Some(record) = self.record_mut(parent) {
                record.children.remove(&child);
            }
        }

        for &slot in &staged.removed {
            let vacated = self.slots.get_mut(slot.index()).and_then(Option::take);
            if let Some(record) = vacated {
                self.index.remove(&record.id);
                self.free.push(slot);
            }
        }
    }

    // ---------------------------------------------------------------
    // Validation
    // ---------------------------------------------------------------

    /// Check the genealogy's structural integrity.
    ///
    /// Verifies that:
    /// - The stem exists and has no parents.
    /// - The index and the arena agree.
    /// - Every edge points at a live record and is recorded on both ends.
    /// - Every virus is reachable from the stem.
    pub fn validate(&self) -> std::result::Result<(), Violation<V::Id>> {
        let stem = match self.index.get(&self.stem_id) {
            Some(&slot) if slot == self.stem => self.record(slot),
            _ => None,
        };
        let Some(stem) = stem else {
            return Err(Violation::MissingStem(self.stem_id.clone()));
        };
        if let Some(&parent) = stem.parents.first() {
            return Err(Violation::StemHasParent {
                stem: self.stem_id.clone(),
                parent: self.id_at(parent).unwrap_or_else(|| self.stem_id.clone()),
            });
        }

        let mut live = 0;
        for (position, entry) in self.slots.iter().enumerate() {
            let Some(record) = entry else {
                continue;
            };
            live += 1;
            let slot = Slot::new(position);
            if self.index.get(&record.id) != Some(&slot) {
                return Err(Violation::IndexMismatch(record.id.clone()));
            }
            for &parent in &record.parents {
                let Some(parent_record) = self.record(parent) else {
                    return Err(Violation::DanglingEdge(record.id.clone()));
                };
                if !parent_record.children.contains(&slot) {
                    return Err(Violation::AsymmetricEdge {
                        parent: parent_record.id.clone(),
                        child: record.id.clone(),
                    });
                }
            }
            for &child in &record.children {
                let Some(child_record) = self.record(child) else {
                    return Err(Violation::DanglingEdge(record.id.clone()));
                };
                if !child_record.parents.contains(&slot) {
                    return Err(Violation::AsymmetricEdge {
                        parent: record.id.clone(),
                        child: child_record.id.clone(),
                    });
                }
            }
        }
        if live != self.index.len() {
            let stray = self
                .index
                .iter()
                .find(|(id, slot)| self.record(**slot).map_or(true, |r| r.id != **id));
            if let Some((id, _)) = stray {
                return Err(Violation::IndexMismatch(id.clone()));
            }
        }

        let reachable: HashSet<Slot> = self.walk(self.stem, Direction::Down).into_iter().collect();
        for (position, entry) in self.slots.iter().enumerate() {
            let slot = Slot::new(position);
            if let Some(record) = entry {
                if slot != self.stem && (record.is_orphan() || !reachable.contains(&slot)) {
                    return Err(Violation::Unreachable(record.id.clone()));
                }
            }
        }

        Ok(())
    }

    // ---------------------------------------------------------------
    // Arena helpers
    // ---------------------------------------------------------------

    fn slot_of(&self, id: &V::Id) -> Result<Slot, V> {
        self.index
            .get(id)
            .copied()
            .ok_or_else(|| GenealogyError::NotFound(id.clone()))
    }

    fn lookup(&self, id: &V::Id) -> Result<&Record<V::Id, V>, V> {
        let slot = self.slot_of(id)?;
        self.record(slot)
            .ok_or_else(|| GenealogyError::NotFound(id.clone()))
    }

    fn record(&self, slot: Slot) -> Option<&Record<V::Id, V>> {
        self.slots.get(slot.index()).and_then(Option::as_ref)
    }

    fn record_mut(&mut self, slot: Slot) -> Option<&mut Record<V::Id, V>> {
        self.slots.get_mut(slot.index()).and_then(Option::as_mut)
    }

    fn id_at(&self, slot: Slot) -> Option<V::Id> {
        self.record(slot).map(|record| record.id.clone())
    }

    fn ids_of(&self, slots: &BTreeSet<Slot>) -> Vec<V::Id> {
        slots.iter().filter_map(|&slot| self.id_at(slot)).collect()
    }

    fn allocate(&mut self, record: Record<V::Id, V>) -> Slot {
        if let Some(slot) = self.free.pop() {
            self.slots[slot.index()] = Some(record);
            slot
        } else {
            self.slots.push(Some(record));
            Slot::new(self.slots.len() - 1)
        }
    }

    /// Breadth-first closure from `start`, excluding `start` itself.
    fn walk(&self, start: Slot, direction: Direction) -> Vec<Slot> {
        let mut result = Vec::new();
        self.walk_until(start, direction, |slot| {
            result.push(slot);
            false
        });
        result
    }

    /// Breadth-first traversal from `start`, excluding `start` itself, that
    /// stops as soon as `visit` returns `true`. Returns whether it stopped.
    fn walk_until<F>(&self, start: Slot, direction: Direction, mut visit: F) -> bool
    where
        F: FnMut(Slot) -> bool,
    {
        let mut visited = HashSet::new();
        visited.insert(start);
        let mut queue = VecDeque::from([start]);

        while let Some(current) = queue.pop_front() {
            let Some(record) = self.record(current) else {
                continue;
            };
            for &next in direction.edges(record) {
                if visited.insert(next) {
                    if visit(next) {
                        return true;
                    }
                    queue.push_back(next);
                }
            }
        }

        false
    }

    /// Returns `true` if `to` is `from` or one of its descendants.
    fn reaches(&self, from: Slot, to: Slot) -> bool {
        if from == to {
            return true;
        }
        self.record(from).is_some_and(|r| !r.is_leaf())
            && self.walk_until(from, Direction::Down, |slot| slot == to)
    }
}
