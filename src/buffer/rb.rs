//! Red-black tree machinery.
//!
//! Standard red-black insertion and deletion, augmented with the two
//! left-subtree aggregates (`size_left`, `lf_left`). Rotations patch the
//! aggregates of the two rotated nodes in O(1); structural edits repair the
//! path to the root with either the incremental walk
//! ([`TextBuffer::update_tree_metadata`]) or the recompute-from-subtree walk
//! ([`TextBuffer::recompute_tree_metadata`]).
//!
//! The algorithms temporarily write to the sentinel's parent link; every
//! entry point restores it via `reset_sentinel` before returning.

use crate::buffer::node::{Color, NodeId, Piece};
use crate::buffer::TextBuffer;

/// Apply a signed delta to an unsigned aggregate.
pub(crate) fn add_delta(value: usize, delta: isize) -> usize {
    debug_assert!(delta >= 0 || value >= delta.unsigned_abs());
    (value as isize + delta) as usize
}

impl TextBuffer {
    /// Byte size of the subtree rooted at `node`.
    ///
    /// Walks only the right spine, trusting `size_left` aggregates.
    pub(crate) fn calculate_size(&self, mut node: NodeId) -> usize {
        let mut size = 0;
        while !node.is_nil() {
            let n = self.node(node);
            size += n.size_left + n.piece.length;
            node = n.right;
        }
        size
    }

    /// Line-feed count of the subtree rooted at `node`.
    pub(crate) fn calculate_lf(&self, mut node: NodeId) -> usize {
        let mut lf = 0;
        while !node.is_nil() {
            let n = self.node(node);
            lf += n.lf_left + n.piece.line_feed_count;
            node = n.right;
        }
        lf
    }

    fn left_rotate(&mut self, x: NodeId) {
        let y = self.node(x).right;

        // y gains x and x's left subtree on its left.
        let x_size = self.node(x).size_left + self.node(x).piece.length;
        let x_lf = self.node(x).lf_left + self.node(x).piece.line_feed_count;
        self.node_mut(y).size_left += x_size;
        self.node_mut(y).lf_left += x_lf;

        let y_left = self.node(y).left;
        self.node_mut(x).right = y_left;
        if !y_left.is_nil() {
            self.node_mut(y_left).parent = x;
        }

        let x_parent = self.node(x).parent;
        self.node_mut(y).parent = x_parent;
        if x_parent.is_nil() {
            self.root = y;
        } else if self.node(x_parent).left == x {
            self.node_mut(x_parent).left = y;
        } else {
            self.node_mut(x_parent).right = y;
        }

        self.node_mut(y).left = x;
        self.node_mut(x).parent = y;
    }

    fn right_rotate(&mut self, y: NodeId) {
        let x = self.node(y).left;

        let y_right = self.node(x).right;
        self.node_mut(y).left = y_right;
        if !y_right.is_nil() {
            self.node_mut(y_right).parent = y;
        }

        let y_parent = self.node(y).parent;
        self.node_mut(x).parent = y_parent;

        // y loses x and x's left subtree from its left.
        let x_size = self.node(x).size_left + self.node(x).piece.length;
        let x_lf = self.node(x).lf_left + self.node(x).piece.line_feed_count;
        self.node_mut(y).size_left -= x_size;
        self.node_mut(y).lf_left -= x_lf;

        if y_parent.is_nil() {
            self.root = x;
        } else if self.node(y_parent).right == y {
            self.node_mut(y_parent).right = x;
        } else {
            self.node_mut(y_parent).left = x;
        }

        self.node_mut(x).right = y;
        self.node_mut(y).parent = x;
    }

    /// Splice a new node carrying `piece` immediately after `node` in-order.
    ///
    /// `node` is ignored when the tree is empty.
    pub(crate) fn rb_insert_right(&mut self, node: NodeId, piece: Piece) -> NodeId {
        let z = self.nodes.alloc(piece);

        if self.root.is_nil() {
            self.root = z;
            self.node_mut(z).color = Color::Black;
        } else if self.node(node).right.is_nil() {
            self.node_mut(node).right = z;
            self.node_mut(z).parent = node;
        } else {
            let next = self.nodes.leftmost(self.node(node).right);
            self.node_mut(next).left = z;
            self.node_mut(z).parent = next;
        }

        self.fix_insert(z);
        z
    }

    /// Splice a new node carrying `piece` immediately before `node` in-order.
    pub(crate) fn rb_insert_left(&mut self, node: NodeId, piece: Piece) -> NodeId {
        let z = self.nodes.alloc(piece);

        if self.root.is_nil() {
            self.root = z;
            self.node_mut(z).color = Color::Black;
        } else if self.node(node).left.is_nil() {
            self.node_mut(node).left = z;
            self.node_mut(z).parent = node;
        } else {
            let prev = self.nodes.rightmost(self.node(node).left);
            self.node_mut(prev).right = z;
            self.node_mut(z).parent = prev;
        }

        self.fix_insert(z);
        z
    }

    fn fix_insert(&mut self, mut x: NodeId) {
        self.recompute_tree_metadata(x);

        while x != self.root && self.node(self.node(x).parent).color == Color::Red {
            let parent = self.node(x).parent;
            let grandparent = self.node(parent).parent;

            if parent == self.node(grandparent).left {
                let uncle = self.node(grandparent).right;
                if self.node(uncle).color == Color::Red {
                    self.node_mut(parent).color = Color::Black;
                    self.node_mut(uncle).color = Color::Black;
                    self.node_mut(grandparent).color = Color::Red;
                    x = grandparent;
                } else {
                    if x == self.node(parent).right {
                        x = parent;
                        self.left_rotate(x);
                    }
                    let parent = self.node(x).parent;
                    let grandparent = self.node(parent).parent;
                    self.node_mut(parent).color = Color::Black;
                    self.node_mut(grandparent).color = Color::Red;
                    self.right_rotate(grandparent);
                }
            } else {
                let uncle = self.node(grandparent).left;
                if self.node(uncle).color == Color::Red {
                    self.node_mut(parent).color = Color::Black;
                    self.node_mut(uncle).color = Color::Black;
                    self.node_mut(grandparent).color = Color::Red;
                    x = grandparent;
                } else {
                    if x == self.node(parent).left {
                        x = parent;
                        self.right_rotate(x);
                    }
                    let parent = self.node(x).parent;
                    let grandparent = self.node(parent).parent;
                    self.node_mut(parent).color = Color::Black;
                    self.node_mut(grandparent).color = Color::Red;
                    self.left_rotate(grandparent);
                }
            }
        }

        let root = self.root;
        self.node_mut(root).color = Color::Black;
        self.nodes.reset_sentinel();
    }

    /// Remove `z` from the tree, rebalance, and recycle its slot.
    pub(crate) fn rb_delete(&mut self, z: NodeId) {
        let (x, y);
        if self.node(z).left.is_nil() {
            y = z;
            x = self.node(y).right;
        } else if self.node(z).right.is_nil() {
            y = z;
            x = self.node(y).left;
        } else {
            y = self.nodes.leftmost(self.node(z).right);
            x = self.node(y).right;
        }

        if y == self.root {
            self.root = x;
            self.node_mut(x).color = Color::Black;
            self.nodes.free(z);
            self.nodes.reset_sentinel();
            let root = self.root;
            self.node_mut(root).parent = NodeId::NIL;
            self.nodes.reset_sentinel();
            return;
        }

        let y_was_red = self.node(y).color == Color::Red;

        let y_parent = self.node(y).parent;
        if y == self.node(y_parent).left {
            self.node_mut(y_parent).left = x;
        } else {
            self.node_mut(y_parent).right = x;
        }

        if y == z {
            self.node_mut(x).parent = y_parent;
            self.recompute_tree_metadata(x);
        } else {
            if self.node(y).parent == z {
                self.node_mut(x).parent = y;
            } else {
                let yp = self.node(y).parent;
                self.node_mut(x).parent = yp;
            }

            // x's place in the hierarchy changed; settle its path first.
            self.recompute_tree_metadata(x);

            let z_left = self.node(z).left;
            let z_right = self.node(z).right;
            let z_parent = self.node(z).parent;
            let z_color = self.node(z).color;
            {
                let y_node = self.node_mut(y);
                y_node.left = z_left;
                y_node.right = z_right;
                y_node.parent = z_parent;
                y_node.color = z_color;
            }

            if z == self.root {
                self.root = y;
            } else if z == self.node(z_parent).left {
                self.node_mut(z_parent).left = y;
            } else {
                self.node_mut(z_parent).right = y;
            }

            if !z_left.is_nil() {
                self.node_mut(z_left).parent = y;
            }
            if !z_right.is_nil() {
                self.node_mut(z_right).parent = y;
            }

            // y replaced z, so y inherits z's left-subtree aggregates.
            let (z_size_left, z_lf_left) = {
                let z_node = self.node(z);
                (z_node.size_left, z_node.lf_left)
            };
            self.node_mut(y).size_left = z_size_left;
            self.node_mut(y).lf_left = z_lf_left;
            self.recompute_tree_metadata(y);
        }

        self.nodes.free(z);

        let x_parent = self.node(x).parent;
        if self.node(x_parent).left == x {
            let new_size_left = self.calculate_size(x);
            let new_lf_left = self.calculate_lf(x);
            let (old_size, old_lf) = {
                let p = self.node(x_parent);
                (p.size_left, p.lf_left)
            };
            if new_size_left != old_size || new_lf_left != old_lf {
                let delta = new_size_left as isize - old_size as isize;
                let lf_delta = new_lf_left as isize - old_lf as isize;
                self.node_mut(x_parent).size_left = new_size_left;
                self.node_mut(x_parent).lf_left = new_lf_left;
                self.update_tree_metadata(x_parent, delta, lf_delta);
            }
        }

        self.recompute_tree_metadata(x_parent);

        if y_was_red {
            self.nodes.reset_sentinel();
            return;
        }

        self.delete_fixup(x);
        self.nodes.reset_sentinel();
    }

    fn delete_fixup(&mut self, mut x: NodeId) {
        while x != self.root && self.node(x).color == Color::Black {
            let parent = self.node(x).parent;
            if x == self.node(parent).left {
                let mut w = self.node(parent).right;

                if self.node(w).color == Color::Red {
                    self.node_mut(w).color = Color::Black;
                    self.node_mut(parent).color = Color::Red;
                    self.left_rotate(parent);
                    w = self.node(self.node(x).parent).right;
                }

                let w_children_black = self.node(self.node(w).left).color == Color::Black
                    && self.node(self.node(w).right).color == Color::Black;
                if w_children_black {
                    self.node_mut(w).color = Color::Red;
                    x = self.node(x).parent;
                } else {
                    if self.node(self.node(w).right).color == Color::Black {
                        let w_left = self.node(w).left;
                        self.node_mut(w_left).color = Color::Black;
                        self.node_mut(w).color = Color::Red;
                        self.right_rotate(w);
                        w = self.node(self.node(x).parent).right;
                    }

                    let parent = self.node(x).parent;
                    let parent_color = self.node(parent).color;
                    self.node_mut(w).color = parent_color;
                    self.node_mut(parent).color = Color::Black;
                    let w_right = self.node(w).right;
                    self.node_mut(w_right).color = Color::Black;
                    self.left_rotate(parent);
                    x = self.root;
                }
            } else {
                let mut w = self.node(parent).left;

                if self.node(w).color == Color::Red {
                    self.node_mut(w).color = Color::Black;
                    self.node_mut(parent).color = Color::Red;
                    self.right_rotate(parent);
                    w = self.node(self.node(x).parent).left;
                }

                let w_children_black = self.node(self.node(w).left).color == Color::Black
                    && self.node(self.node(w).right).color == Color::Black;
                if w_children_black {
                    self.node_mut(w).color = Color::Red;
                    x = self.node(x).parent;
                } else {
                    if self.node(self.node(w).left).color == Color::Black {
                        let w_right = self.node(w).right;
                        self.node_mut(w_right).color = Color::Black;
                        self.node_mut(w).color = Color::Red;
                        self.left_rotate(w);
                        w = self.node(self.node(x).parent).left;
                    }

                    let parent = self.node(x).parent;
                    let parent_color = self.node(parent).color;
                    self.node_mut(w).color = parent_color;
                    self.node_mut(parent).color = Color::Black;
                    let w_left = self.node(w).left;
                    self.node_mut(w_left).color = Color::Black;
                    self.right_rotate(parent);
                    x = self.root;
                }
            }
        }
        self.node_mut(x).color = Color::Black;
    }

    /// Incremental aggregate repair: a single piece changed by
    /// (`delta`, `lf_delta`) without structural motion. Walk to the root,
    /// patching every parent that sees the change in its left subtree.
    pub(crate) fn update_tree_metadata(&mut self, mut x: NodeId, delta: isize, lf_delta: isize) {
        if delta == 0 && lf_delta == 0 {
            return;
        }
        while x != self.root && !x.is_nil() {
            let parent = self.node(x).parent;
            if self.node(parent).left == x {
                let p = self.node_mut(parent);
                p.size_left = add_delta(p.size_left, delta);
                p.lf_left = add_delta(p.lf_left, lf_delta);
            }
            x = parent;
        }
    }

    /// Recompute-from-subtree aggregate repair: find the nearest ancestor
    /// whose left subtree contains `x`, re-derive its aggregates, and bubble
    /// the correction to the root. O(log n).
    pub(crate) fn recompute_tree_metadata(&mut self, mut x: NodeId) {
        if x == self.root {
            return;
        }

        while x != self.root && x == self.node(self.node(x).parent).right {
            x = self.node(x).parent;
        }

        if x == self.root {
            // The change sits on the rightmost spine; no left aggregate
            // above it can be affected.
            return;
        }

        x = self.node(x).parent;

        let new_size = self.calculate_size(self.node(x).left);
        let new_lf = self.calculate_lf(self.node(x).left);
        let delta = new_size as isize - self.node(x).size_left as isize;
        let lf_delta = new_lf as isize - self.node(x).lf_left as isize;
        self.node_mut(x).size_left = new_size;
        self.node_mut(x).lf_left = new_lf;

        if delta == 0 && lf_delta == 0 {
            return;
        }
        while x != self.root {
            let parent = self.node(x).parent;
            if self.node(parent).left == x {
                let p = self.node_mut(parent);
                p.size_left = add_delta(p.size_left, delta);
                p.lf_left = add_delta(p.lf_left, lf_delta);
            }
            x = parent;
        }
    }
}
