//! A reference model for [`BalancedTree`], shared by the property tests and the fuzz targets.

extern crate std;

use std::{collections::BTreeMap, prelude::v1::*};

use arbitrary::Arbitrary;
use proptest::strategy::{Just, Strategy};

use crate::{BalancedTree, Key};

#[derive(Copy, Clone, Debug, Arbitrary)]
pub enum ItemValue {
    /// Selects one of the keys currently in the tree, wrapping around.
    Index(usize),
    Random(Key),
}

proptest::prop_compose! {
    fn index_strategy()(
        index in 0usize..1000,
    ) -> ItemValue {
        ItemValue::Index(index)
    }
}

proptest::prop_compose! {
    fn random_strategy()(
        random in -500 as Key..500,
    ) -> ItemValue {
        ItemValue::Random(random)
    }
}

fn value_strategy() -> impl Strategy<Value = ItemValue> {
    proptest::prop_oneof![index_strategy(), random_strategy()]
}

#[derive(Copy, Clone, Debug, Arbitrary)]
pub enum Op {
    Insert(ItemValue),
    Delete(ItemValue),
    Search(ItemValue),
    FindMin,
    FindMax,
    PopMin,
    PopMax,
}

impl Op {
    fn finalize(self, model: &Multiset) -> FinalOp {
        let get_value = |i: ItemValue| match i {
            ItemValue::Index(idx) => model
                .counts
                .keys()
                .nth(idx % model.counts.len().max(1))
                .copied()
                .unwrap_or(idx as Key),
            ItemValue::Random(v) => v,
        };

        match self {
            Op::Insert(item) => FinalOp::Insert(get_value(item)),
            Op::Delete(item) => FinalOp::Delete(get_value(item)),
            Op::Search(item) => FinalOp::Search(get_value(item)),
            Op::FindMin => FinalOp::FindMin,
            Op::FindMax => FinalOp::FindMax,
            Op::PopMin => FinalOp::PopMin,
            Op::PopMax => FinalOp::PopMax,
        }
    }
}

#[derive(Copy, Clone, Debug)]
enum FinalOp {
    Insert(Key),
    Delete(Key),
    Search(Key),
    FindMin,
    FindMax,
    PopMin,
    PopMax,
}

pub fn op_strategy() -> impl Strategy<Value = Op> {
    proptest::prop_oneof![
        3 => value_strategy().prop_map(Op::Insert),
        2 => value_strategy().prop_map(Op::Delete),
        1 => value_strategy().prop_map(Op::Search),
        1 => Just(Op::FindMin),
        1 => Just(Op::FindMax),
        1 => Just(Op::PopMin),
        1 => Just(Op::PopMax),
    ]
}

/// A sorted multiset of keys.
#[derive(Debug, Default)]
struct Multiset {
    counts: BTreeMap<Key, usize>,
    len: usize,
}

impl Multiset {
    fn insert(&mut self, key: Key) {
        *self.counts.entry(key).or_default() += 1;
        self.len += 1;
    }

    fn remove(&mut self, key: Key) -> bool {
        let Some(count) = self.counts.get_mut(&key) else {
            return false;
        };

        *count -= 1;
        if *count == 0 {
            self.counts.remove(&key);
        }
        self.len -= 1;

        true
    }

    fn contains(&self, key: Key) -> bool {
        self.counts.contains_key(&key)
    }

    fn min(&self) -> Option<Key> {
        self.counts.keys().next().copied()
    }

    fn max(&self) -> Option<Key> {
        self.counts.keys().next_back().copied()
    }

    fn iter(&self) -> impl Iterator<Item = Key> + '_ {
        self.counts
            .iter()
            .flat_map(|(&key, &count)| core::iter::repeat(key).take(count))
    }
}

/// Returns the greatest height an AVL tree with `len` nodes can reach.
pub fn max_height(len: usize) -> usize {
    (1.4405 * ((len + 2) as f64).log2() - 0.3277) as usize
}

/// Applies `ops` to both a [`BalancedTree`] and a multiset model, panicking on any divergence or
/// broken tree invariant.
pub fn run_multiset_equivalence(ops: Vec<Op>) {
    let mut model = Multiset::default();
    let mut tree = BalancedTree::new();

    for (op_id, op) in ops.into_iter().enumerate() {
        let final_op = op.finalize(&model);

        match final_op {
            FinalOp::Insert(key) => {
                model.insert(key);
                tree.insert(key);
            }

            FinalOp::Delete(key) => {
                let from_model = model.remove(key);
                let from_tree = tree.delete(key);

                assert_eq!(from_model, from_tree, "FinalOp #{op_id}: {final_op:?}");
            }

            FinalOp::Search(key) => {
                let from_model = model.contains(key).then_some(key);
                let from_tree = tree.search(key);

                assert_eq!(from_model, from_tree, "FinalOp #{op_id}: {final_op:?}");
            }

            FinalOp::FindMin => {
                assert_eq!(model.min(), tree.find_min(), "FinalOp #{op_id}: {final_op:?}");
            }

            FinalOp::FindMax => {
                assert_eq!(model.max(), tree.find_max(), "FinalOp #{op_id}: {final_op:?}");
            }

            FinalOp::PopMin => {
                let from_model = model.min().filter(|&key| model.remove(key));
                let from_tree = tree.pop_min();

                assert_eq!(from_model, from_tree, "FinalOp #{op_id}: {final_op:?}");
            }

            FinalOp::PopMax => {
                let from_model = model.max().filter(|&key| model.remove(key));
                let from_tree = tree.pop_max();

                assert_eq!(from_model, from_tree, "FinalOp #{op_id}: {final_op:?}");
            }
        }

        tree.assert_invariants();
        assert_eq!(model.len, tree.len());
        assert!(
            tree.height() <= max_height(tree.len()),
            "height {} exceeds the AVL bound for {} keys",
            tree.height(),
            tree.len()
        );
        assert!(model.iter().eq(tree.traverse()), "FinalOp #{op_id}: {final_op:?}");
    }
}
