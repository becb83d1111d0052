use core::fmt;

use smallvec::SmallVec;

use super::OrderedTree;
use crate::raw::{Color, Direction, Handle};

/// A printable dump of an [`OrderedTree`]'s shape.
///
/// One line per node in pre-order, indented four spaces per level. The marker is `*` for the
/// root, `<` for a left child and `>` for a right child, followed by the key and the color
/// (`r` or `b`).
///
/// This `struct` is created by the [`structure`](OrderedTree::structure) method.
///
/// # Examples
///
/// ```
/// use sentinel_rbtree::OrderedTree;
///
/// let tree = OrderedTree::from([10, 20, 30]);
/// assert_eq!(
///     tree.structure().to_string(),
///     "* key: 20, color: b\n    < key: 10, color: r\n    > key: 30, color: r\n",
/// );
/// ```
pub struct Structure<'a> {
    tree: &'a OrderedTree,
}

impl OrderedTree {
    /// Returns a [`Display`](fmt::Display)able dump of the tree's nodes, keys and colors.
    #[must_use]
    pub fn structure(&self) -> Structure<'_> {
        Structure { tree: self }
    }

    /// Counts the black nodes from the root down to a leaf, not counting the sentinel.
    ///
    /// Every root-to-leaf path has the same count, so the leftmost one is walked.
    ///
    /// # Examples
    ///
    /// ```
    /// use sentinel_rbtree::OrderedTree;
    ///
    /// assert_eq!(OrderedTree::new().black_height(), 0);
    /// assert_eq!(OrderedTree::from([1, 2, 3, 4, 5, 6, 7]).black_height(), 2);
    /// ```
    #[must_use]
    pub fn black_height(&self) -> usize {
        let raw = &self.raw;
        let mut height = 0;
        let mut current = raw.root();
        while !raw.is_nil(current) {
            if raw.color(current) == Color::Black {
                height += 1;
            }
            current = raw.child(current, Direction::Left);
        }
        height
    }
}

impl fmt::Display for Structure<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let raw = &self.tree.raw;
        let mut stack: SmallVec<[(Handle, usize, char); 64]> = SmallVec::new();
        if !raw.is_nil(raw.root()) {
            stack.push((raw.root(), 0, '*'));
        }

        while let Some((handle, depth, marker)) = stack.pop() {
            writeln!(
                f,
                "{:indent$}{marker} key: {}, color: {}",
                "",
                raw.key(handle),
                raw.color(handle).tag(),
                indent = depth * 4,
            )?;
            // Right first so the left subtree is printed first.
            for (dir, marker) in [(Direction::Right, '>'), (Direction::Left, '<')] {
                let child = raw.child(handle, dir);
                if !raw.is_nil(child) {
                    stack.push((child, depth + 1, marker));
                }
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Structure<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn empty_tree_prints_nothing() {
        assert_eq!(OrderedTree::new().structure().to_string(), "");
    }

    #[test]
    fn nested_levels_are_indented() {
        let tree = OrderedTree::from([4, 2, 6, 1]);
        let expected = "\
* key: 4, color: b
    < key: 2, color: b
        < key: 1, color: r
    > key: 6, color: b
";
        assert_eq!(tree.structure().to_string(), expected);
    }

    #[test]
    fn black_height_of_ascending_run() {
        let tree = OrderedTree::from([1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(tree.black_height(), 2);
        assert_eq!(tree.node(tree.root().unwrap()).unwrap().key(), 2);
    }
}
