use core::{iter::FusedIterator, ptr::NonNull};

use crate::{AvlTree, Dir, Link, Links, TreeNode};

enum CameFrom {
    Parent,
    LeftChild,
    Here,
    RightChild,
}

/// An in-order iterator over the elements of an [`AvlTree`].
///
/// The walk follows parent links, so it needs no auxiliary storage.
pub struct Iter<'tree, T: TreeNode<Links<T>> + ?Sized> {
    tree: &'tree AvlTree<T>,

    front_cur: Link<T>,
    front_from: CameFrom,

    len: usize,
}

impl<'tree, T: TreeNode<Links<T>> + ?Sized> Iter<'tree, T> {
    pub(crate) fn new(tree: &'tree AvlTree<T>) -> Self {
        Iter {
            tree,

            front_cur: tree.root,
            front_from: CameFrom::Parent,
            len: tree.len(),
        }
    }

    // Records that the subtree rooted at `cur` is exhausted and moves to its parent.
    fn ascend(&mut self, cur: &mut NonNull<T>) {
        let parent = unsafe { T::links(*cur).as_ref().parent() }
            .expect("the root is never exhausted while elements remain");

        self.front_from = match unsafe { self.tree.which_child(parent, *cur) } {
            Dir::Left => CameFrom::LeftChild,
            Dir::Right => CameFrom::RightChild,
        };

        *cur = parent;
    }
}

impl<'tree, T: TreeNode<Links<T>> + ?Sized> Iterator for Iter<'tree, T> {
    type Item = &'tree T;

    fn next(&mut self) -> Option<Self::Item> {
        if self.len == 0 {
            return None;
        }

        let mut cur = self.front_cur?;

        loop {
            match self.front_from {
                CameFrom::Parent => {
                    // Upon entering a new subtree, find the minimum element.
                    cur = unsafe { self.tree.extreme_in_subtree(cur, Dir::Left) };

                    // Once the minimum is found, its (empty) left subtree has been exhausted.
                    self.front_from = CameFrom::LeftChild;
                }

                CameFrom::LeftChild => {
                    // The left subtree has been exhausted, so this node is up next. Save off the
                    // iterator state and return it.
                    self.front_cur = Some(cur);
                    self.front_from = CameFrom::Here;
                    self.len -= 1;

                    return Some(unsafe { cur.as_ref() });
                }

                CameFrom::Here => {
                    // The current node was just yielded.
                    match unsafe { T::links(cur).as_ref().right() } {
                        // If the right subtree is not empty, go there.
                        Some(right) => {
                            self.front_from = CameFrom::Parent;
                            cur = right;
                        }

                        // Otherwise this subtree is done.
                        None => self.ascend(&mut cur),
                    }
                }

                // Both subtrees and the node itself are done.
                CameFrom::RightChild => self.ascend(&mut cur),
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.len, Some(self.len))
    }
}

impl<T: TreeNode<Links<T>> + ?Sized> ExactSizeIterator for Iter<'_, T> {}

impl<T: TreeNode<Links<T>> + ?Sized> FusedIterator for Iter<'_, T> {}
