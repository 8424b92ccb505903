//! Property tests: random operation sequences must preserve the genealogy's
//! structural invariants, and failed operations must change nothing.
//!
//! Operations pick their arguments as indices into the viruses alive at the
//! time they run, so most of them succeed and the genealogies grow.

use std::collections::BTreeMap;

use proptest::prelude::*;
use proptest::sample::Index;
use proptest::strategy::ValueTree;
use vg_genealogy::{Genealogy, GenealogyError, SampleVirus};

type G = Genealogy<SampleVirus<u16>>;

const STEM: u16 = 0;
/// Never handed out by [`Builder`].
const UNKNOWN: u16 = u16::MAX;

#[derive(Clone, Debug)]
enum Op {
    /// Fresh virus under one to three live parents.
    Create(Vec<Index>),
    /// Create reusing a live identifier.
    CreateExisting(Index, Vec<Index>),
    /// Create under live parents plus one unknown parent.
    CreateUnderUnknown(Vec<Index>),
    Connect(Index, Index),
    /// Remove a live non-stem virus, or the stem if it is alone.
    Remove(Index),
}

fn arb_parents() -> impl Strategy<Value = Vec<Index>> {
    prop::collection::vec(any::<Index>(), 1..4)
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        6 => arb_parents().prop_map(Op::Create),
        1 => (any::<Index>(), arb_parents()).prop_map(|(id, parents)| Op::CreateExisting(id, parents)),
        1 => arb_parents().prop_map(Op::CreateUnderUnknown),
        3 => (any::<Index>(), any::<Index>()).prop_map(|(child, parent)| Op::Connect(child, parent)),
        2 => any::<Index>().prop_map(Op::Remove),
    ]
}

fn arb_ops(max: usize) -> impl Strategy<Value = Vec<Op>> {
    prop::collection::vec(arb_op(), 0..max)
}

/// Drives a genealogy, handing out fresh identifiers.
struct Builder {
    g: G,
    next_id: u16,
}

impl Builder {
    fn new() -> Self {
        Self {
            g: G::new(STEM),
            next_id: STEM + 1,
        }
    }

    fn from_ops(ops: &[Op]) -> Self {
        let mut builder = Self::new();
        for op in ops {
            let _ = builder.apply(op);
        }
        builder
    }

    fn live(&self) -> Vec<u16> {
        self.g.ids().copied().collect()
    }

    fn live_non_stem(&self) -> Vec<u16> {
        self.g.ids().copied().filter(|&id| id != STEM).collect()
    }

    fn pick(&self, index: &Index) -> u16 {
        *index.get(&self.live())
    }

    fn fresh(&mut self) -> u16 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn apply(&mut self, op: &Op) -> Result<(), GenealogyError<u16>> {
        match op {
            Op::Create(parents) => {
                let parents: Vec<u16> = parents.iter().map(|p| self.pick(p)).collect();
                let id = self.fresh();
                self.g.create_with_parents(id, parents)
            }
            Op::CreateExisting(id, parents) => {
                let id = self.pick(id);
                let parents: Vec<u16> = parents.iter().map(|p| self.pick(p)).collect();
                self.g.create_with_parents(id, parents)
            }
            Op::CreateUnderUnknown(parents) => {
                let mut parents: Vec<u16> = parents.iter().map(|p| self.pick(p)).collect();
                parents.push(UNKNOWN);
                let id = self.fresh();
                self.g.create_with_parents(id, parents)
            }
            Op::Connect(child, parent) => {
                let (child, parent) = (self.pick(child), self.pick(parent));
                self.g.connect(&child, &parent)
            }
            Op::Remove(target) => {
                let candidates = self.live_non_stem();
                let target = if candidates.is_empty() {
                    STEM
                } else {
                    *target.get(&candidates)
                };
                self.g.remove(&target).map(|_| ())
            }
        }
    }
}

/// Every virus with its sorted parents and children.
fn snapshot(g: &G) -> BTreeMap<u16, (Vec<u16>, Vec<u16>)> {
    g.ids()
        .map(|&id| {
            let mut parents = g.parents_of(&id).unwrap();
            let mut children = g.children_of(&id).unwrap();
            parents.sort_unstable();
            children.sort_unstable();
            (id, (parents, children))
        })
        .collect()
}

#[test]
fn generated_genealogies_grow() {
    let mut runner = proptest::test_runner::TestRunner::deterministic();
    let strategy = prop::collection::vec(arb_op(), 20..60);
    let mut total = 0;
    let draws = 200;
    for _ in 0..draws {
        let ops = strategy.new_tree(&mut runner).unwrap().current();
        total += Builder::from_ops(&ops).g.len();
    }
    assert!(total > 3 * draws, "average genealogy size {}", total as f64 / draws as f64);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(512))]

    #[test]
    fn invariants_hold_after_every_operation(ops in arb_ops(80)) {
        let mut builder = Builder::new();
        for op in &ops {
            let before = snapshot(&builder.g);
            let result = builder.apply(op);

            prop_assert_eq!(*builder.g.stem_id(), STEM);
            prop_assert!(builder.g.validate().is_ok(), "{:?} broke {:?}", op, builder.g.validate());

            for (id, (parents, _)) in snapshot(&builder.g) {
                for parent in parents {
                    prop_assert!(builder.g.children_of(&parent).unwrap().contains(&id));
                }
            }

            if result.is_err() {
                prop_assert_eq!(snapshot(&builder.g), before);
            }
        }
    }

    #[test]
    fn stem_is_never_removable(ops in arb_ops(60)) {
        let mut builder = Builder::from_ops(&ops);
        prop_assert_eq!(builder.g.remove(&STEM), Err(GenealogyError::CannotRemoveStem(STEM)));
        prop_assert!(builder.g.exists(&STEM));
    }

    #[test]
    fn failed_creation_leaves_no_trace(
        ops in arb_ops(60),
        existing in any::<Index>(),
        parents in arb_parents(),
        reuse_id in any::<bool>(),
    ) {
        let mut builder = Builder::from_ops(&ops);
        let mut parents: Vec<u16> = parents.iter().map(|p| builder.pick(p)).collect();
        let id = if reuse_id {
            builder.pick(&existing)
        } else {
            parents.push(UNKNOWN);
            builder.fresh()
        };
        let existed = builder.g.exists(&id);
        let before = snapshot(&builder.g);

        let result = builder.g.create_with_parents(id, parents);

        if reuse_id {
            prop_assert_eq!(result, Err(GenealogyError::AlreadyExists(id)));
        } else {
            prop_assert_eq!(result, Err(GenealogyError::NotFound(UNKNOWN)));
        }
        prop_assert_eq!(builder.g.exists(&id), existed);
        prop_assert_eq!(snapshot(&builder.g), before);
    }

    #[test]
    fn connect_is_idempotent(ops in arb_ops(60), child in any::<Index>(), parent in any::<Index>()) {
        let mut builder = Builder::from_ops(&ops);
        let (child, parent) = (builder.pick(&child), builder.pick(&parent));

        let first = builder.g.connect(&child, &parent);
        let once = snapshot(&builder.g);
        let second = builder.g.connect(&child, &parent);

        prop_assert_eq!(snapshot(&builder.g), once);
        prop_assert_eq!(first.is_ok(), second.is_ok());
        if first.is_ok() {
            prop_assert!(builder.g.parents_of(&child).unwrap().contains(&parent));
        }
    }

    #[test]
    fn removal_drops_exactly_the_plan(ops in arb_ops(80), target in any::<Index>()) {
        let mut builder = Builder::from_ops(&ops);
        if builder.live_non_stem().is_empty() {
            let id = builder.fresh();
            builder.g.create(id, STEM).unwrap();
        }
        let target = *target.get(&builder.live_non_stem());
        let before = snapshot(&builder.g);

        let planned = builder.g.plan_removal(&target).unwrap();
        let plan = builder.g.remove(&target).unwrap();
        prop_assert_eq!(&planned, &plan);
        prop_assert_eq!(plan.target, target);
        prop_assert_eq!(plan.removed.first(), Some(&target));

        for id in before.keys() {
            prop_assert_eq!(builder.g.exists(id), !plan.removes(id));
        }

        // Nothing is removed unless every parent it had went with it.
        for id in plan.cascade() {
            let (parents, _) = &before[id];
            prop_assert!(!parents.is_empty());
            for parent in parents {
                prop_assert!(plan.removes(parent), "{} lost {} but kept {}", target, id, parent);
            }
        }

        // Nothing survives without a parent.
        for id in builder.g.ids().copied().collect::<Vec<_>>() {
            prop_assert!(id == STEM || !builder.g.parents_of(&id).unwrap().is_empty());
        }

        // Survivors lose exactly their edges to removed viruses.
        for (id, (parents, children)) in snapshot(&builder.g) {
            let (old_parents, old_children) = &before[&id];
            let kept = |ids: &Vec<u16>| ids.iter().copied().filter(|x| !plan.removes(x)).collect::<Vec<_>>();
            prop_assert_eq!(parents, kept(old_parents));
            prop_assert_eq!(children, kept(old_children));
        }
    }
}
