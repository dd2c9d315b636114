extern crate std;

use std::{ops::Range, prelude::v1::*};

use proptest::prelude::*;

use crate::model;

use super::*;

#[repr(C)]
struct TestNode {
    links: Links<TestNode>,
    key: Key,
}

impl TestNode {
    fn new(key: Key) -> Box<TestNode> {
        Box::new(TestNode {
            links: Links::new(),
            key,
        })
    }
}

unsafe impl Linked<Links<TestNode>> for TestNode {
    type Handle = Box<TestNode>;

    fn into_ptr(r: Self::Handle) -> NonNull<Self> {
        NonNull::new(Box::into_raw(r)).unwrap()
    }

    unsafe fn from_ptr(ptr: NonNull<Self>) -> Self::Handle {
        unsafe { Box::from_raw(ptr.as_ptr()) }
    }

    unsafe fn links(ptr: NonNull<Self>) -> NonNull<Links<TestNode>> {
        // SAFETY: Self is #[repr(C)] and `links` is first field
        ptr.cast()
    }
}

impl TreeNode<Links<TestNode>> for TestNode {
    fn key(&self) -> Key {
        self.key
    }
}

fn keys(tree: &AvlTree<TestNode>) -> Vec<Key> {
    tree.iter().map(|node| node.key).collect()
}

fn sorted(keys: &[Key]) -> Vec<Key> {
    let mut keys = keys.to_vec();
    keys.sort_unstable();
    keys
}

// Calls `f` with every permutation of `0..n`.
fn for_each_permutation(n: usize, mut f: impl FnMut(&[Key])) {
    fn permute(keys: &mut Vec<Key>, k: usize, f: &mut dyn FnMut(&[Key])) {
        if k == keys.len() {
            f(keys);
            return;
        }

        for i in k..keys.len() {
            keys.swap(k, i);
            permute(keys, k + 1, f);
            keys.swap(k, i);
        }
    }

    let mut keys = (0..n as Key).collect();
    permute(&mut keys, 0, &mut f);
}

// Checks ordering and parent links without requiring balance.
fn assert_linked(tree: &AvlTree<TestNode>, node: NonNull<TestNode>) {
    unsafe {
        for dir in [Dir::Left, Dir::Right] {
            if let Some(child) = TestNode::links(node).as_ref().child(dir) {
                assert_eq!(TestNode::links(child).as_ref().parent(), Some(node));
                assert_linked(tree, child);
            }
        }
    }
}

fn insert_find_all(keys: &[Key]) {
    let mut tree: AvlTree<TestNode> = AvlTree::new();

    for &key in keys {
        tree.insert(TestNode::new(key));
        tree.assert_invariants();
    }

    for &key in keys {
        let node = tree.get_raw(key).expect("item not found");
        assert_eq!(unsafe { node.as_ref().key() }, key);
    }

    assert_eq!(self::keys(&tree), sorted(keys));
}

#[test]
fn zero_elems_find() {
    insert_find_all(&[]);
}

#[test]
fn single_elem_find() {
    insert_find_all(&[0]);
}

#[test]
fn small_trees_find() {
    for n in 2..=6 {
        for_each_permutation(n, insert_find_all);
    }
}

fn insert_remove_all(keys: &[Key]) {
    let mut tree: AvlTree<TestNode> = AvlTree::new();

    for &key in keys {
        tree.insert(TestNode::new(key));
        tree.assert_invariants();
    }

    for &key in keys {
        let node = tree.remove(key).expect("item not found");
        assert_eq!(node.key, key);
        assert!(node.links.is_leaf());
        assert_eq!(node.links.height(), 1);
        tree.assert_invariants();
    }

    assert!(tree.is_empty());

    for &key in keys {
        tree.insert(TestNode::new(key));
        tree.assert_invariants();
    }

    for &key in keys.iter().rev() {
        tree.remove(key).expect("item not found");
        tree.assert_invariants();
    }

    assert!(tree.is_empty());
}

#[test]
fn remove_one() {
    insert_remove_all(&[0]);
}

#[test]
fn small_trees_remove() {
    for n in 2..=6 {
        for_each_permutation(n, insert_remove_all);
    }
}

#[test]
fn empty_tree() {
    let tree = BalancedTree::new();

    assert_eq!(tree.height(), 0);
    assert_eq!(tree.find_min(), None);
    assert_eq!(tree.find_max(), None);
    assert_eq!(tree.search(0), None);
    assert_eq!(tree.search(-1), None);
    assert_eq!(tree.traverse().next(), None);
}

#[test]
fn single_key() {
    let mut tree = BalancedTree::new();
    tree.insert(5);

    assert_eq!(tree.height(), 1);
    assert_eq!(tree.find_min(), Some(5));
    assert_eq!(tree.find_max(), Some(5));
    assert_eq!(tree.search(5), Some(5));
    assert_eq!(tree.search(4), None);
}

#[test]
fn ascending_inserts_rotate_left() {
    let mut tree = BalancedTree::new();

    for key in [10, 20, 30, 40, 50] {
        tree.insert(key);
        tree.assert_invariants();
    }

    assert_eq!(tree.height(), 3);
    assert_eq!(tree.root_key(), Some(20));
    assert_eq!(tree.traverse().collect::<Vec<_>>(), [10, 20, 30, 40, 50]);
}

#[test]
fn descending_inserts_rotate_right() {
    let tree: BalancedTree = [50, 40, 30, 20, 10].into_iter().collect();

    tree.assert_invariants();
    assert_eq!(tree.height(), 3);
    assert_eq!(tree.root_key(), Some(40));
    assert_eq!(tree.traverse().collect::<Vec<_>>(), [10, 20, 30, 40, 50]);
}

#[test]
fn zigzag_inserts_rotate_twice() {
    let tree: BalancedTree = [10, 30, 20].into_iter().collect();
    tree.assert_invariants();
    assert_eq!(tree.root_key(), Some(20));

    let tree: BalancedTree = [30, 10, 20].into_iter().collect();
    tree.assert_invariants();
    assert_eq!(tree.root_key(), Some(20));
}

#[test]
fn delete_root_takes_successor() {
    let mut tree: BalancedTree = [50, 30, 70, 20, 40, 60, 80].into_iter().collect();
    assert_eq!(tree.root_key(), Some(50));

    assert!(tree.delete(50));
    tree.assert_invariants();

    assert_eq!(tree.root_key(), Some(60));
    assert_eq!(tree.height(), 3);
    assert_eq!(tree.traverse().collect::<Vec<_>>(), [20, 30, 40, 60, 70, 80]);
}

#[test]
fn delete_left_child_takes_predecessor() {
    let mut tree: BalancedTree = [50, 30, 70, 20, 40, 60, 80].into_iter().collect();

    assert!(tree.delete(30));
    tree.assert_invariants();

    // 30 is a left child, so its predecessor 20 replaces it.
    let mut out = String::new();
    tree.dotgraph("t", &mut out).unwrap();
    assert!(out.contains("\"grapht-50\" -> \"grapht-20\";"));
    assert!(out.contains("\"grapht-20\" -> \"grapht-40\";"));
    assert_eq!(tree.traverse().collect::<Vec<_>>(), [20, 40, 50, 60, 70, 80]);
}

#[test]
fn delete_right_child_takes_successor() {
    let mut tree: BalancedTree = [50, 30, 70, 20, 40, 60, 80].into_iter().collect();

    assert!(tree.delete(70));
    tree.assert_invariants();

    let mut out = String::new();
    tree.dotgraph("t", &mut out).unwrap();
    assert!(out.contains("\"grapht-50\" -> \"grapht-80\";"));
    assert!(out.contains("\"grapht-80\" -> \"grapht-60\";"));
    assert_eq!(tree.traverse().collect::<Vec<_>>(), [20, 30, 40, 50, 60, 80]);
}

#[test]
fn delete_deep_neighbor_rebalances() {
    // The successor of 20 is 25, two levels down its right subtree. Removing it from there
    // leaves 30 unbalanced.
    let mut tree: BalancedTree = [20, 10, 30, 5, 25, 40, 50].into_iter().collect();
    tree.assert_invariants();
    assert_eq!(tree.root_key(), Some(20));

    assert!(tree.delete(20));
    tree.assert_invariants();

    assert_eq!(tree.root_key(), Some(25));
    assert_eq!(tree.traverse().collect::<Vec<_>>(), [5, 10, 25, 30, 40, 50]);
}

#[test]
fn delete_missing_key_is_noop() {
    let mut tree: BalancedTree = [2, 1, 3].into_iter().collect();

    assert!(!tree.delete(4));
    assert!(!BalancedTree::new().delete(0));

    tree.assert_invariants();
    assert_eq!(tree.len(), 3);
    assert_eq!(tree.traverse().collect::<Vec<_>>(), [1, 2, 3]);
}

#[test]
fn duplicate_keys() {
    let mut tree = BalancedTree::new();

    for _ in 0..5 {
        tree.insert(7);
        tree.assert_invariants();
    }
    tree.insert(3);
    tree.insert(9);

    assert_eq!(tree.len(), 7);
    assert_eq!(tree.search(7), Some(7));
    assert_eq!(tree.traverse().collect::<Vec<_>>(), [3, 7, 7, 7, 7, 7, 9]);

    for remaining in (0..5).rev() {
        assert!(tree.delete(7));
        tree.assert_invariants();
        assert_eq!(tree.traverse().filter(|&k| k == 7).count(), remaining);
    }

    assert!(!tree.delete(7));
    assert_eq!(tree.search(7), None);
}

#[test]
fn negative_and_extreme_keys() {
    let keys = [Key::MIN, -1, 0, 1, Key::MAX];
    let tree: BalancedTree = keys.iter().rev().copied().collect();

    tree.assert_invariants();
    assert_eq!(tree.find_min(), Some(Key::MIN));
    assert_eq!(tree.find_max(), Some(Key::MAX));
    assert_eq!(tree.search(-1), Some(-1));
    assert_eq!(tree.traverse().collect::<Vec<_>>(), keys);
}

#[test]
fn rotation_preserves_order() {
    let mut tree: AvlTree<TestNode> = AvlTree::new();
    for key in [4, 2, 6, 1, 3, 5, 7] {
        tree.insert(TestNode::new(key));
    }
    let before = keys(&tree);

    let root = tree.root.unwrap();
    let left = unsafe { TestNode::links(root).as_ref().left() }.unwrap();
    let right = unsafe { TestNode::links(root).as_ref().right() }.unwrap();

    // Right rotation at the root.
    tree.rotate_at(root, left);
    assert_eq!(tree.root, Some(left));
    assert_linked(&tree, left);
    assert_eq!(keys(&tree), before);
    assert_eq!(tree.height(), 4);

    // Left rotation back.
    tree.rotate_at(left, root);
    assert_eq!(tree.root, Some(root));
    assert_linked(&tree, root);
    assert_eq!(keys(&tree), before);
    tree.assert_invariants();

    // Left rotation below the root.
    tree.rotate_at(right, unsafe { TestNode::links(right).as_ref().right() }.unwrap());
    assert_linked(&tree, root);
    assert_eq!(keys(&tree), before);
}

#[test]
fn remove_at_detaches_node() {
    let mut tree: AvlTree<TestNode> = AvlTree::new();
    for key in 0..16 {
        tree.insert(TestNode::new(key));
    }

    let root = tree.root.unwrap();
    let node = unsafe { tree.remove_at(root) };
    tree.assert_invariants();

    assert_eq!(node.links.parent(), None);
    assert!(node.links.is_leaf());
    assert!(!tree.contains_key(node.key));
    assert_eq!(tree.len(), 15);
}

#[test]
fn first_last_and_pop() {
    let mut tree: AvlTree<TestNode> = AvlTree::new();
    assert!(tree.first().is_none());
    assert!(tree.pop_last().is_none());

    for key in [8, 3, 12, 1, 5] {
        tree.insert(TestNode::new(key));
    }

    assert_eq!(tree.first().map(|n| n.key), Some(1));
    assert_eq!(tree.last().map(|n| n.key), Some(12));
    assert_eq!(tree.pop_first().map(|n| n.key), Some(1));
    assert_eq!(tree.pop_last().map(|n| n.key), Some(12));
    tree.assert_invariants();
    assert_eq!(keys(&tree), [3, 5, 8]);
}

#[cfg(miri)]
const FUZZ_RANGE: Range<usize> = 0..10;

#[cfg(not(miri))]
const FUZZ_RANGE: Range<usize> = 0..1000;

proptest::proptest! {
    #![proptest_config(ProptestConfig {
        max_shrink_iters: 65536,
        .. ProptestConfig::default()
    })]

    #[test]
    fn multiset_equivalence(ops in proptest::collection::vec(model::op_strategy(), FUZZ_RANGE)) {
        model::run_multiset_equivalence(ops);
    }

    #[test]
    fn traversal_is_sorted(keys in proptest::collection::vec(any::<Key>(), FUZZ_RANGE)) {
        let tree: BalancedTree = keys.iter().copied().collect();

        tree.assert_invariants();
        prop_assert_eq!(tree.traverse().collect::<Vec<_>>(), sorted(&keys));
        prop_assert!(tree.height() <= model::max_height(keys.len()));
    }

    #[test]
    fn search_finds_only_present_keys(
        keys in proptest::collection::btree_set(-1000 as Key..1000, 0..200),
        probes in proptest::collection::vec(-1100 as Key..1100, 0..200),
    ) {
        let tree: BalancedTree = keys.iter().copied().collect();

        for &key in &keys {
            prop_assert_eq!(tree.search(key), Some(key));
        }

        for probe in probes {
            prop_assert_eq!(tree.search(probe), keys.contains(&probe).then_some(probe));
        }
    }

    #[test]
    fn insert_then_delete_restores_traversal(
        keys in proptest::collection::btree_set(any::<Key>(), 0..200),
        extra in any::<Key>(),
    ) {
        prop_assume!(!keys.contains(&extra));

        let mut tree: BalancedTree = keys.iter().copied().collect();
        let before = tree.traverse().collect::<Vec<_>>();

        tree.insert(extra);
        tree.assert_invariants();
        prop_assert!(tree.delete(extra));
        tree.assert_invariants();

        prop_assert_eq!(tree.traverse().collect::<Vec<_>>(), before);
    }
}
