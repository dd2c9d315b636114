//! An intrusive AVL tree over integer keys.
//!
//! [`AvlTree`] links caller-allocated nodes through an embedded [`Links`] value, in the style of
//! the [`cordyceps`] collections. [`BalancedTree`] wraps it with heap-allocated nodes and exposes
//! a plain integer-keyed interface.
//!
//! ```
//! use cordyceps_avl::BalancedTree;
//!
//! let mut tree = BalancedTree::new();
//! for key in [10, 20, 30, 40, 50] {
//!     tree.insert(key);
//! }
//!
//! assert_eq!(tree.height(), 3);
//! assert_eq!(tree.search(30), Some(30));
//! assert!(tree.delete(30));
//! assert_eq!(tree.traverse().collect::<Vec<_>>(), [10, 20, 40, 50]);
//! ```
//#![no_std]

// Conventions used in comments:
// - The height of a node `x` is denoted `h(x)`. A missing child has height 0, a leaf height 1.
// - The balance factor of `x` is `h(right(x)) - h(left(x))`.
// - A node is `d`-heavy if its balance factor leans toward direction `d`.
//
// The invariants of the tree are:
// 1. Every balance factor is -1, 0 or 1.
// 2. `h(x) = 1 + max(h(left(x)), h(right(x)))` for every node.
// 3. An in-order walk yields non-decreasing keys. A key equal to an existing key is inserted to
//    the right of it, but rotations may later move equal keys to either side.
//
// Corollaries:
// 4. `h(root) < 1.4405 * log2(n + 2) - 0.3277`, so every descent is O(log(n)).
// 5. A node with a single child has height 2, and that child is a leaf.
//
// All updates are bottom-up: after a structural change at some node, every node on the path to
// the root has its height recomputed and, if its balance factor has reached +/-2, is rotated.

use core::{
    cell::UnsafeCell, cmp::Ordering, fmt, marker::PhantomPinned, mem, ops::Not, pin::Pin,
    ptr::NonNull,
};

use cordyceps::Linked;

mod debug;
mod iter;
mod set;

#[cfg(any(test, feature = "model"))]
pub mod model;

#[cfg(test)]
mod tests;

pub use iter::Iter;
pub use set::{BalancedTree, Traverse};

/// The type of key by which tree nodes are ordered.
pub type Key = i64;

/// A node which can be linked into an [`AvlTree`].
pub trait TreeNode<L>: Linked<L> {
    /// Returns the node's key.
    ///
    /// The key must not change while the node is linked into a tree.
    fn key(&self) -> Key;
}

/// An intrusive AVL tree.
///
/// Nodes are ordered by [`TreeNode::key`]. Nodes with equal keys may coexist; a node is always
/// inserted after every existing node with an equal key.
pub struct AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    root: Link<T>,
    len: usize,
}

/// The links embedded in every node of an [`AvlTree`].
pub struct Links<T: ?Sized> {
    inner: UnsafeCell<LinksInner<T>>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Dir {
    Left = 0,
    Right = 1,
}

impl Not for Dir {
    type Output = Dir;

    fn not(self) -> Self::Output {
        match self {
            Dir::Left => Dir::Right,
            Dir::Right => Dir::Left,
        }
    }
}

#[repr(C)]
struct LinksInner<T: ?Sized> {
    parent: Link<T>,
    children: [Link<T>; 2],
    height: u8,
    _unpin: PhantomPinned,
}

type Link<T> = Option<NonNull<T>>;

impl<T> AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    /// Returns a new empty tree.
    pub const fn new() -> AvlTree<T> {
        AvlTree { root: None, len: 0 }
    }

    /// Returns `true` if the tree contains no elements.
    pub const fn is_empty(&self) -> bool {
        let empty = self.len() == 0;

        if cfg!(debug_assertions) {
            // Can't use assert_eq!() in const fn.
            assert!(empty == self.root.is_none());
        }

        empty
    }

    /// Returns the number of elements in the tree.
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns the height of the tree.
    ///
    /// An empty tree has height 0 and a tree with a single element has height 1.
    pub fn height(&self) -> usize {
        usize::from(unsafe { self.height_of(self.root) })
    }

    /// Returns a reference to the root element of the tree.
    pub fn root(&self) -> Option<Pin<&T>> {
        self.root
            .map(|root| unsafe { Pin::new_unchecked(root.as_ref()) })
    }

    /// Returns an iterator over the elements of the tree, in ascending key order.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter::new(self)
    }

    #[doc(hidden)]
    pub fn assert_invariants(&self) {
        let mut count = 0;

        if let Some(root) = self.root {
            unsafe {
                assert_eq!(T::links(root).as_ref().parent(), None, "root has a parent");
                self.assert_invariants_at(root, None, None, &mut count);
            }
        }

        assert_eq!(count, self.len, "reachable node count does not match `len`");
    }

    // Checks the subtree rooted at `node`, whose keys must lie within `lower..=upper`, and returns
    // its recomputed height.
    #[allow(clippy::only_used_in_recursion)]
    unsafe fn assert_invariants_at(
        &self,
        node: NonNull<T>,
        lower: Option<Key>,
        upper: Option<Key>,
        count: &mut usize,
    ) -> u8 {
        *count += 1;

        unsafe {
            let key = node.as_ref().key();

            if let Some(lower) = lower {
                assert!(key >= lower, "key {key} is left of an ancestor with key {lower}");
            }

            if let Some(upper) = upper {
                assert!(key <= upper, "key {key} is right of an ancestor with key {upper}");
            }

            let mut heights = [0u8; 2];

            for dir in [Dir::Left, Dir::Right] {
                if let Some(child) = T::links(node).as_ref().child(dir) {
                    // Ensure child's parent link points to this node.
                    let parent = T::links(child)
                        .as_ref()
                        .parent()
                        .expect("child parent pointer not set");
                    assert_eq!(node, parent);

                    let (lower, upper) = match dir {
                        Dir::Left => (lower, Some(key)),
                        Dir::Right => (Some(key), upper),
                    };

                    heights[dir as usize] = self.assert_invariants_at(child, lower, upper, count);
                }
            }

            // Ensure the cached height is exact.
            let height = heights[0].max(heights[1]) + 1;
            assert_eq!(
                T::links(node).as_ref().height(),
                height,
                "stale height at key {key}"
            );

            // Ensure the node is balanced.
            let balance = i16::from(heights[1]) - i16::from(heights[0]);
            assert!(
                (-1..=1).contains(&balance),
                "key {key} has balance factor {balance}"
            );

            height
        }
    }

    /// Returns a reference to an element with the given key.
    ///
    /// If several elements share `key`, the one found first on the search path is returned.
    pub fn get(&self, key: Key) -> Option<Pin<&T>> {
        let ptr = self.get_raw(key)?;
        unsafe { Some(Pin::new_unchecked(ptr.as_ref())) }
    }

    /// Returns `true` if the tree contains an element with the given key.
    pub fn contains_key(&self, key: Key) -> bool {
        self.get_raw(key).is_some()
    }

    pub(crate) fn get_raw(&self, key: Key) -> Link<T> {
        let mut opt_cur = self.root;

        loop {
            let cur = opt_cur?;

            unsafe {
                match key.cmp(&cur.as_ref().key()) {
                    Ordering::Less => opt_cur = T::links(cur).as_ref().left(),
                    Ordering::Equal => return Some(cur),
                    Ordering::Greater => opt_cur = T::links(cur).as_ref().right(),
                }
            }
        }
    }

    /// Returns the minimum element of the tree.
    pub fn first(&self) -> Option<Pin<&T>> {
        unsafe {
            let first = self.extreme_in_subtree(self.root?, Dir::Left);
            Some(Pin::new_unchecked(first.as_ref()))
        }
    }

    /// Returns the maximum element of the tree.
    pub fn last(&self) -> Option<Pin<&T>> {
        unsafe {
            let last = self.extreme_in_subtree(self.root?, Dir::Right);
            Some(Pin::new_unchecked(last.as_ref()))
        }
    }

    /// Inserts an item into the tree.
    ///
    /// If the tree already contains elements with the same key, the item is placed after all of
    /// them in key order.
    ///
    /// This operation completes in _O(log(n))_ time.
    pub fn insert(&mut self, item: T::Handle) {
        let ptr = T::into_ptr(item);

        // A new node is always a leaf.
        unsafe { T::links(ptr).as_mut().clear() };

        let root = match self.root {
            Some(root) => root,
            None => {
                // Tree is empty. Set `item` as the root and return.
                self.root = Some(ptr);
                self.len += 1;
                return;
            }
        };

        let key = unsafe { ptr.as_ref().key() };
        let mut parent = root;

        // Descend the tree, looking for a free slot. Equal keys go right.
        loop {
            let dir = if key >= unsafe { parent.as_ref().key() } {
                Dir::Right
            } else {
                Dir::Left
            };

            unsafe {
                let parent_links = T::links(parent).as_mut();
                match parent_links.child(dir) {
                    // Descend.
                    Some(child) => parent = child,

                    // Set `item` as child.
                    None => {
                        parent_links.set_child(dir, Some(ptr));
                        T::links(ptr).as_mut().set_parent(Some(parent));
                        break;
                    }
                }
            }
        }

        self.len += 1;
        self.rebalance_from(Some(parent));
    }

    /// Removes an element with the given key from the tree and returns it.
    ///
    /// The element removed is the one [`get`](Self::get) would return.
    pub fn remove(&mut self, key: Key) -> Option<T::Handle> {
        let node = self.get_raw(key)?;
        unsafe { Some(self.remove_at(node)) }
    }

    /// Removes and returns the minimum element of the tree.
    pub fn pop_first(&mut self) -> Option<T::Handle> {
        let first = unsafe { self.extreme_in_subtree(self.root?, Dir::Left) };
        unsafe { Some(self.remove_at(first)) }
    }

    /// Removes and returns the maximum element of the tree.
    pub fn pop_last(&mut self) -> Option<T::Handle> {
        let last = unsafe { self.extreme_in_subtree(self.root?, Dir::Right) };
        unsafe { Some(self.remove_at(last)) }
    }

    /// Removes an arbitrary node from the tree.
    ///
    /// The removed node's links are cleared before its handle is returned.
    ///
    /// # Safety
    ///
    /// It is the caller's responsibility to ensure that `node` is an element of `self`, and not any
    /// other tree.
    pub unsafe fn remove_at(&mut self, node: NonNull<T>) -> T::Handle {
        // There are three possible cases:
        //
        // 1. `node` is a leaf. It is unlinked from its parent.
        //
        // 2. `node` has one child. The child is elevated into `node`'s slot.
        //
        // 3. `node` has two children. An in-order neighbor of `node` is unlinked from its own
        //    position and takes `node`'s place. If `node` is the root or a right child, the
        //    neighbor is its successor (the least node of its right subtree); otherwise it is its
        //    predecessor (the greatest node of its left subtree). The neighbor has no child on the
        //    side facing `node`, so unlinking it is case 1 or 2.
        //
        // In every case the heights of the nodes between the lowest modified position and the root
        // may be stale, and any of them may be unbalanced by one level. They are repaired
        // bottom-up.

        unsafe {
            let parent = T::links(node).as_ref().parent();
            let left = T::links(node).as_ref().left();
            let right = T::links(node).as_ref().right();

            let rebalance_from = match (left, right) {
                (Some(_), Some(_)) => {
                    let side = match parent {
                        Some(parent) => self.which_child(parent, node),
                        None => Dir::Right,
                    };

                    Some(self.replace_with_neighbor(node, side))
                }

                (Some(child), None) | (None, Some(child)) => {
                    self.replace_child_or_set_root(parent, node, Some(child));
                    T::links(child).as_mut().set_parent(parent);
                    parent
                }

                (None, None) => {
                    self.replace_child_or_set_root(parent, node, None);
                    parent
                }
            };

            T::links(node).as_mut().clear();
            self.len -= 1;

            self.rebalance_from(rebalance_from);

            T::from_ptr(node)
        }
    }

    // Replaces the two-child node `node` with its in-order neighbor on `side` and returns the
    // lowest node whose subtree changed.
    //
    // Heights are not updated.
    unsafe fn replace_with_neighbor(&mut self, node: NonNull<T>, side: Dir) -> NonNull<T> {
        unsafe {
            let parent = T::links(node).as_ref().parent();
            let near = T::links(node)
                .as_ref()
                .child(side)
                .expect("node must have two children");
            let far = T::links(node)
                .as_ref()
                .child(!side)
                .expect("node must have two children");

            let neighbor = self.extreme_in_subtree(near, !side);

            tracing::debug!(
                key = node.as_ref().key(),
                neighbor = neighbor.as_ref().key(),
                ?side,
                "replacing two-child node with its neighbor"
            );

            let lowest = if neighbor == near {
                // The neighbor is `node`'s own child and keeps its `side` subtree.
                neighbor
            } else {
                let neighbor_parent = T::links(neighbor)
                    .as_ref()
                    .parent()
                    .expect("neighbor must be below `near`");

                // Elevate the neighbor's only possible child (which may be None) into its slot.
                let orphan = T::links(neighbor).as_ref().child(side);
                self.replace_child(neighbor_parent, neighbor, orphan);
                self.maybe_set_parent(orphan, Some(neighbor_parent));

                T::links(neighbor).as_mut().set_child(side, Some(near));
                T::links(near).as_mut().set_parent(Some(neighbor));

                neighbor_parent
            };

            T::links(neighbor).as_mut().set_child(!side, Some(far));
            T::links(far).as_mut().set_parent(Some(neighbor));

            T::links(neighbor).as_mut().set_parent(parent);
            self.replace_child_or_set_root(parent, node, Some(neighbor));

            lowest
        }
    }

    /// Clears the tree, removing all elements.
    pub fn clear(&mut self) {
        let mut opt_cur = self.root;

        while let Some(cur) = opt_cur {
            unsafe {
                // Descend to the minimum node.
                let (cur, parent) = self.min_in_subtree(cur);
                let parent = parent.or_else(|| T::links(cur).as_ref().parent());

                let right = T::links(cur).as_ref().right();

                // Elevate the node's right child (which may be None).
                self.replace_child_or_set_root(parent, cur, right);
                self.maybe_set_parent(right, parent);

                // Drop the node.
                T::links(cur).as_mut().clear();
                drop(T::from_ptr(cur));
                self.len -= 1;

                // If the node had no right child, climb to the parent. If the node had no parent,
                // the tree is empty.
                opt_cur = right.or(parent);
            }
        }

        debug_assert!(self.root.is_none());
        debug_assert_eq!(self.len(), 0);
    }

    // Recomputes the height of every node from `start` up to the root, rotating each one which is
    // found unbalanced.
    fn rebalance_from(&mut self, start: Link<T>) {
        let mut opt_cur = start;

        while let Some(cur) = opt_cur {
            unsafe {
                self.update_height(cur);
                let top = self.balance(cur);
                opt_cur = T::links(top).as_ref().parent();
            }
        }
    }

    // Restores the balance of `node`, whose subtrees are both balanced and differ in height by at
    // most 2.
    //
    // Returns the node which now occupies `node`'s former position.
    unsafe fn balance(&mut self, node: NonNull<T>) -> NonNull<T> {
        let heavy = match unsafe { self.balance_factor(node) } {
            2 => Dir::Right,
            -2 => Dir::Left,
            _ => return node,
        };

        unsafe {
            let child = T::links(node)
                .as_ref()
                .child(heavy)
                .expect("heavy side must not be empty");

            // If the heavy child leans the other way, a single rotation would only mirror the
            // imbalance. Straighten the child first.
            if self.is_heavy(child, !heavy) {
                let grandchild = T::links(child)
                    .as_ref()
                    .child(!heavy)
                    .expect("heavy side must not be empty");
                self.rotate_at(child, grandchild);
            }

            let up = T::links(node)
                .as_ref()
                .child(heavy)
                .expect("heavy side must not be empty");
            self.rotate_at(node, up);

            up
        }
    }

    // Performs a rotation, moving `up` up and its parent `down` down.
    //
    // The heights of `down` and then `up` are recomputed.
    pub(crate) fn rotate_at(&mut self, down: NonNull<T>, up: NonNull<T>) {
        unsafe {
            // - `down` becomes the `dir` child of `up`.
            // - `across` goes from the `dir` child of `up` to the `!dir` child of `down`.
            let dir = if T::links(down).as_ref().right() == Some(up) {
                Dir::Left
            } else {
                Dir::Right
            };

            debug_assert_eq!(T::links(up).as_ref().parent(), Some(down));

            tracing::trace!(
                down = down.as_ref().key(),
                up = up.as_ref().key(),
                ?dir,
                "rotating"
            );

            let across = T::links(up).as_ref().child(dir);
            T::links(down).as_mut().set_child(!dir, across);
            self.maybe_set_parent(across, Some(down));

            T::links(up).as_mut().set_child(dir, Some(down));
            let parent = T::links(down).as_mut().set_parent(Some(up));
            T::links(up).as_mut().set_parent(parent);

            self.replace_child_or_set_root(parent, down, Some(up));

            // Child before new parent.
            self.update_height(down);
            self.update_height(up);
        }
    }

    // Support methods ========================================================

    // Returns the minimum node in the subtree.
    //
    // If the subtree root is not the minimum, also returns the minimum node's parent.
    #[inline]
    unsafe fn min_in_subtree(&self, root: NonNull<T>) -> (NonNull<T>, Option<NonNull<T>>) {
        let mut parent = None;
        let mut cur = root;

        while let Some(left) = unsafe { T::links(cur).as_ref().left() } {
            parent = Some(cur);
            cur = left;
        }

        (cur, parent)
    }

    // Returns the node reached by following `dir` links from `root` for as long as possible.
    #[inline]
    pub(crate) unsafe fn extreme_in_subtree(&self, root: NonNull<T>, dir: Dir) -> NonNull<T> {
        let mut cur = root;

        while let Some(child) = unsafe { T::links(cur).as_ref().child(dir) } {
            cur = child;
        }

        cur
    }

    unsafe fn maybe_set_parent(&mut self, opt_node: Link<T>, parent: Link<T>) {
        let Some(node) = opt_node else {
            return;
        };

        unsafe { T::links(node).as_mut().set_parent(parent) };
    }

    #[inline]
    unsafe fn replace_child_or_set_root(
        &mut self,
        parent: Link<T>,
        old_child: NonNull<T>,
        new_child: Link<T>,
    ) {
        match parent {
            Some(parent) => unsafe { self.replace_child(parent, old_child, new_child) },
            None => self.root = new_child,
        }
    }

    // Replaces the child pointer of `parent` pointing at `old_child` with `new_child`.
    //
    // `new_child`'s parent pointer is not updated.
    //
    // # Safety
    //
    // The caller must ensure that the following conditions hold:
    // - `old_child` is a child node of `parent`.
    // - `new_child` is not a child node of `parent`.
    #[inline]
    unsafe fn replace_child(
        &mut self,
        parent: NonNull<T>,
        old_child: NonNull<T>,
        new_child: Link<T>,
    ) {
        unsafe {
            let dir = self.which_child(parent, old_child);

            debug_assert_eq!(
                T::links(parent).as_ref().child(dir),
                Some(old_child),
                "`old_child` must be a child of `parent`"
            );
            debug_assert!(
                new_child.is_none() || T::links(parent).as_ref().child(!dir) != new_child,
                "`new_child` must not be a child of `parent`"
            );

            T::links(parent).as_mut().set_child(dir, new_child);
        }
    }

    #[inline]
    unsafe fn update_height(&mut self, node: NonNull<T>) {
        unsafe {
            let left = self.height_of(T::links(node).as_ref().left());
            let right = self.height_of(T::links(node).as_ref().right());
            T::links(node).as_mut().set_height(left.max(right) + 1);
        }
    }

    /// Returns the height of the pointed-to node, or 0 if there is none.
    #[inline]
    unsafe fn height_of(&self, node: Link<T>) -> u8 {
        node.map(|n| unsafe { T::links(n).as_ref().height() })
            .unwrap_or(0)
    }

    unsafe fn balance_factor(&self, node: NonNull<T>) -> i16 {
        unsafe {
            let left = self.height_of(T::links(node).as_ref().left());
            let right = self.height_of(T::links(node).as_ref().right());

            i16::from(right) - i16::from(left)
        }
    }

    unsafe fn is_heavy(&self, node: NonNull<T>, dir: Dir) -> bool {
        let balance = unsafe { self.balance_factor(node) };

        match dir {
            Dir::Left => balance < 0,
            Dir::Right => balance > 0,
        }
    }

    pub(crate) unsafe fn which_child(&self, parent: NonNull<T>, child: NonNull<T>) -> Dir {
        if unsafe { T::links(parent).as_ref().left() } == Some(child) {
            Dir::Left
        } else {
            Dir::Right
        }
    }
}

impl<T> Default for AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    fn drop(&mut self) {
        self.clear();
    }
}

impl<T> fmt::Debug for AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AvlTree")
            .field("root", &self.root)
            .field("len", &self.len)
            .finish()
    }
}

impl<T: ?Sized> Links<T> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            inner: UnsafeCell::new(LinksInner {
                parent: None,
                children: [None; 2],
                height: 1,
                _unpin: PhantomPinned,
            }),
        }
    }

    /// Returns `true` if this node is a leaf or is not linked into a tree.
    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.left().is_none() && self.right().is_none()
    }

    /// Returns the cached height of the subtree rooted at this node.
    #[inline]
    pub fn height(&self) -> u8 {
        unsafe { (*self.inner.get()).height }
    }

    #[inline]
    fn parent(&self) -> Link<T> {
        unsafe { (*self.inner.get()).parent }
    }

    #[inline]
    fn child(&self, dir: Dir) -> Link<T> {
        unsafe { (*self.inner.get()).children[dir as usize] }
    }

    #[inline]
    fn left(&self) -> Link<T> {
        self.child(Dir::Left)
    }

    #[inline]
    fn right(&self) -> Link<T> {
        self.child(Dir::Right)
    }

    #[inline]
    fn set_parent(&mut self, parent: Link<T>) -> Link<T> {
        mem::replace(&mut self.inner.get_mut().parent, parent)
    }

    #[inline]
    fn set_child(&mut self, dir: Dir, child: Link<T>) -> Link<T> {
        mem::replace(&mut self.inner.get_mut().children[dir as usize], child)
    }

    #[inline]
    fn set_height(&mut self, height: u8) {
        self.inner.get_mut().height = height;
    }

    // Resets the links to those of a detached leaf.
    #[inline]
    fn clear(&mut self) {
        let inner = self.inner.get_mut();
        inner.parent = None;
        inner.children = [None; 2];
        inner.height = 1;
    }
}

impl<T: ?Sized> Default for Links<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> fmt::Debug for Links<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Links")
            .field("parent", &self.parent())
            .field("left", &self.left())
            .field("right", &self.right())
            .field("height", &self.height())
            .finish()
    }
}
