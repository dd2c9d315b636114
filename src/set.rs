extern crate alloc;

use alloc::boxed::Box;
use core::{fmt, iter::FusedIterator, marker::PhantomPinned, ptr::NonNull};

use cordyceps::Linked;

use crate::{AvlTree, Iter, Key, Links, TreeNode};

/// A self-balancing binary search tree of integer keys, based on an [AVL tree].
///
/// Keys may repeat. Each insertion adds a new node, placed after every existing node with the same
/// key, and each deletion removes a single node.
///
/// [AVL tree]: https://en.wikipedia.org/wiki/AVL_tree
pub struct BalancedTree {
    tree: AvlTree<Node>,
}

struct Node {
    links: Links<Node>,
    key: Key,
    _unpin: PhantomPinned,
}

// SAFETY: every node is exclusively owned by the tree through a `Box`, and node links are only
// mutated through `&mut BalancedTree`.
unsafe impl Send for BalancedTree {}
unsafe impl Sync for BalancedTree {}

impl Node {
    fn new(key: Key) -> Box<Node> {
        Box::new(Node {
            links: Links::new(),
            key,
            _unpin: PhantomPinned,
        })
    }
}

unsafe impl Linked<Links<Node>> for Node {
    type Handle = Box<Self>;

    fn into_ptr(r: Self::Handle) -> NonNull<Self> {
        Box::leak(r).into()
    }

    unsafe fn from_ptr(ptr: NonNull<Self>) -> Self::Handle {
        unsafe { Box::from_raw(ptr.as_ptr()) }
    }

    unsafe fn links(ptr: NonNull<Self>) -> NonNull<Links<Node>> {
        let ptr = ptr.as_ptr();
        unsafe { NonNull::new_unchecked(core::ptr::addr_of_mut!((*ptr).links)) }
    }
}

impl TreeNode<Links<Node>> for Node {
    fn key(&self) -> Key {
        self.key
    }
}

impl BalancedTree {
    /// Creates a new, empty `BalancedTree`.
    pub const fn new() -> Self {
        Self {
            tree: AvlTree::new(),
        }
    }

    /// Returns `true` if the tree contains no keys.
    pub const fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Returns the number of keys in the tree, counting repeats.
    pub const fn len(&self) -> usize {
        self.tree.len()
    }

    /// Inserts `key` into the tree.
    ///
    /// This always adds a node, even if `key` is already present.
    #[inline]
    pub fn insert(&mut self, key: Key) {
        self.tree.insert(Node::new(key));
    }

    /// Removes one occurrence of `key` from the tree.
    ///
    /// Returns `false`, leaving the tree unchanged, if `key` is not present.
    #[inline]
    pub fn delete(&mut self, key: Key) -> bool {
        self.tree.remove(key).is_some()
    }

    /// Returns `key` if it is present in the tree.
    #[inline]
    pub fn search(&self, key: Key) -> Option<Key> {
        self.tree.get(key).map(|node| node.key)
    }

    /// Returns `true` if `key` is present in the tree.
    #[inline]
    pub fn contains(&self, key: Key) -> bool {
        self.tree.contains_key(key)
    }

    /// Returns the minimum key in the tree.
    #[inline]
    pub fn find_min(&self) -> Option<Key> {
        self.tree.first().map(|node| node.key)
    }

    /// Returns the maximum key in the tree.
    #[inline]
    pub fn find_max(&self) -> Option<Key> {
        self.tree.last().map(|node| node.key)
    }

    /// Removes and returns the minimum key in the tree.
    #[inline]
    pub fn pop_min(&mut self) -> Option<Key> {
        self.tree.pop_first().map(|node| node.key)
    }

    /// Removes and returns the maximum key in the tree.
    #[inline]
    pub fn pop_max(&mut self) -> Option<Key> {
        self.tree.pop_last().map(|node| node.key)
    }

    /// Returns the key stored at the root of the tree.
    #[inline]
    pub fn root_key(&self) -> Option<Key> {
        self.tree.root().map(|node| node.key)
    }

    /// Returns the height of the tree, which is 0 if the tree is empty.
    #[inline]
    pub fn height(&self) -> usize {
        self.tree.height()
    }

    /// Returns an iterator over the keys of the tree in ascending order.
    #[inline]
    pub fn traverse(&self) -> Traverse<'_> {
        Traverse {
            inner: self.tree.iter(),
        }
    }

    /// Clears the tree, removing all keys.
    #[inline]
    pub fn clear(&mut self) {
        self.tree.clear();
    }

    /// Writes a Graphviz description of the tree's shape to `w`.
    ///
    /// Each node is labelled `key:height`.
    pub fn dotgraph<W: fmt::Write>(&self, name: &str, w: W) -> fmt::Result {
        self.tree.dotgraph(name, w)
    }

    #[doc(hidden)]
    pub fn assert_invariants(&self) {
        self.tree.assert_invariants();
    }
}

impl Default for BalancedTree {
    fn default() -> Self {
        Self::new()
    }
}

impl Extend<Key> for BalancedTree {
    fn extend<I: IntoIterator<Item = Key>>(&mut self, iter: I) {
        for key in iter {
            self.insert(key);
        }
    }
}

impl FromIterator<Key> for BalancedTree {
    fn from_iter<I: IntoIterator<Item = Key>>(iter: I) -> Self {
        let mut tree = BalancedTree::new();
        tree.extend(iter);
        tree
    }
}

impl fmt::Debug for BalancedTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.traverse()).finish()
    }
}

/// Formats the keys in ascending order, separated by spaces.
impl fmt::Display for BalancedTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys = self.traverse();

        if let Some(first) = keys.next() {
            write!(f, "{first}")?;
        }

        for key in keys {
            write!(f, " {key}")?;
        }

        Ok(())
    }
}

impl<'a> IntoIterator for &'a BalancedTree {
    type Item = Key;
    type IntoIter = Traverse<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.traverse()
    }
}

/// An iterator over the keys of a [`BalancedTree`], in ascending order.
///
/// Created by [`BalancedTree::traverse`].
pub struct Traverse<'tree> {
    inner: Iter<'tree, Node>,
}

impl Iterator for Traverse<'_> {
    type Item = Key;

    #[inline]
    fn next(&mut self) -> Option<Key> {
        self.inner.next().map(|node| node.key)
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for Traverse<'_> {}

impl FusedIterator for Traverse<'_> {}
