use core::fmt;
use core::iter::FusedIterator;
use core::sync::atomic::{AtomicUsize, Ordering};

use log::warn;

use crate::Key;
use crate::error::TreeError;
use crate::raw::{Color, Direction, Generation, Handle, RawRbTree};

mod capacity;
mod structure;

pub use structure::Structure;

/// Identifies one tree instance so handles cannot be used across trees.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
struct TreeId(usize);

impl TreeId {
    fn next() -> Self {
        static NEXT: AtomicUsize = AtomicUsize::new(0);
        TreeId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// An ordered multiset of integer keys stored in a red-black tree.
///
/// Every leaf edge and the root's parent edge refer to a single black sentinel node, so the
/// balancing code never special-cases absent children. Insert, erase and lookup are O(log n).
///
/// Duplicate keys are allowed. While searching for an insertion point, a key equal to the
/// visited node's key descends right, so equal keys keep their insertion order in
/// [`iter`](OrderedTree::iter). [`find`](OrderedTree::find) returns *some* node with the
/// requested key; which one is unspecified when the key is duplicated.
///
/// Nodes are named by [`NodeHandle`]s. A handle stays valid until its node is erased, and
/// operations given a handle from another tree, or one whose node is gone, return a
/// [`TreeError`] instead of touching the structure.
///
/// # Examples
///
/// ```
/// use sentinel_rbtree::OrderedTree;
///
/// let mut tree = OrderedTree::new();
/// for key in [10, 20, 30] {
///     tree.insert(key)?;
/// }
///
/// let root = tree.root().unwrap();
/// assert_eq!(tree.node(root)?.key(), 20);
///
/// let mut out = [0; 3];
/// assert_eq!(tree.to_sorted_sequence(&mut out), 3);
/// assert_eq!(out, [10, 20, 30]);
///
/// let twenty = tree.find(20).unwrap();
/// assert_eq!(tree.erase(twenty)?, 20);
/// assert_eq!(tree.to_vec(), [10, 30]);
/// # Ok::<(), sentinel_rbtree::TreeError>(())
/// ```
pub struct OrderedTree {
    raw: RawRbTree,
    id: TreeId,
}

/// A reference to a node of an [`OrderedTree`].
///
/// Handles are cheap to copy and do not borrow the tree. They are created by
/// [`insert`](OrderedTree::insert), [`find`](OrderedTree::find) and the other lookups, and are
/// invalidated when their node is erased. An arena slot whose reuse counter
/// runs out is retired rather than recycled, so a stale handle is never
/// mistaken for a newer node.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct NodeHandle {
    tree: TreeId,
    slot: Handle,
    generation: Generation,
}

/// A borrowed view of one node, for inspecting the tree's shape.
///
/// Sentinel links are reported as `None`.
#[derive(Clone, Copy)]
pub struct NodeRef<'a> {
    tree: &'a OrderedTree,
    slot: Handle,
}

/// An iterator over the keys of an [`OrderedTree`] in ascending order.
///
/// This `struct` is created by the [`iter`] method on [`OrderedTree`].
///
/// # Examples
///
/// ```
/// use sentinel_rbtree::OrderedTree;
///
/// let tree = OrderedTree::from([3, 1, 2]);
/// let mut iter = tree.iter();
/// assert_eq!(iter.next(), Some(1));
/// assert_eq!(iter.next_back(), Some(3));
/// assert_eq!(iter.next(), Some(2));
/// assert_eq!(iter.next(), None);
/// ```
///
/// [`iter`]: OrderedTree::iter
#[derive(Clone)]
#[must_use = "iterators are lazy and do nothing unless consumed"]
pub struct Iter<'a> {
    raw: &'a RawRbTree,
    front: Handle,
    back: Handle,
    remaining: usize,
}

impl OrderedTree {
    /// Creates an empty tree.
    ///
    /// # Panics
    ///
    /// Panics if the sentinel cannot be allocated. Use [`try_new`](OrderedTree::try_new) to
    /// handle that case.
    ///
    /// # Examples
    ///
    /// ```
    /// use sentinel_rbtree::OrderedTree;
    ///
    /// let tree = OrderedTree::new();
    /// assert!(tree.is_empty());
    /// assert_eq!(tree.root(), None);
    /// ```
    #[must_use]
    pub fn new() -> Self {
        Self::try_new().unwrap_or_else(|err| panic!("`OrderedTree::new()` - {err}"))
    }

    /// Creates an empty tree, reporting allocation failure of the sentinel.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::AllocationFailed`] if memory for the sentinel is unavailable.
    pub fn try_new() -> Result<Self, TreeError> {
        Self::try_with_capacity(0)
    }

    fn from_raw(raw: RawRbTree) -> Self {
        OrderedTree { raw, id: TreeId::next() }
    }

    /// Tears the tree down, freeing nodes children-first, and returns how many nodes were freed.
    ///
    /// # Examples
    ///
    /// ```
    /// use sentinel_rbtree::OrderedTree;
    ///
    /// let tree = OrderedTree::from([1, 2, 3, 4]);
    /// assert_eq!(tree.destroy(), 4);
    /// ```
    pub fn destroy(mut self) -> usize {
        self.raw.clear()
    }

    /// Removes every key. Handles issued before the call become stale.
    ///
    /// # Examples
    ///
    /// ```
    /// use sentinel_rbtree::{OrderedTree, TreeError};
    ///
    /// let mut tree = OrderedTree::new();
    /// let one = tree.insert(1)?;
    /// tree.clear();
    /// assert!(tree.is_empty());
    /// assert_eq!(tree.erase(one), Err(TreeError::StaleHandle));
    /// # Ok::<(), TreeError>(())
    /// ```
    pub fn clear(&mut self) {
        self.raw.clear();
    }

    /// Returns the number of keys in the tree, counting duplicates.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.raw.len()
    }

    /// Returns true if the tree contains no keys.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Inserts `key` and returns a handle to the new node.
    ///
    /// Equal keys are kept; the new one sorts after existing ones.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::AllocationFailed`] if the node arena cannot grow, or
    /// [`TreeError::CapacityExceeded`] if every node slot is in use. The tree is unchanged in
    /// both cases.
    ///
    /// # Complexity
    ///
    /// O(log n)
    ///
    /// # Examples
    ///
    /// ```
    /// use sentinel_rbtree::OrderedTree;
    ///
    /// let mut tree = OrderedTree::new();
    /// let node = tree.insert(7)?;
    /// assert_eq!(tree.node(node)?.key(), 7);
    /// # Ok::<(), sentinel_rbtree::TreeError>(())
    /// ```
    pub fn insert(&mut self, key: Key) -> Result<NodeHandle, TreeError> {
        match self.raw.insert(key) {
            Ok(slot) => Ok(self.handle(slot)),
            Err(err) => {
                warn!("insert of key {key} failed: {err}");
                Err(err)
            }
        }
    }

    /// Returns a node holding `key`, or `None` if the key is absent.
    ///
    /// # Complexity
    ///
    /// O(log n)
    ///
    /// # Examples
    ///
    /// ```
    /// use sentinel_rbtree::OrderedTree;
    ///
    /// let tree = OrderedTree::from([1, 2, 3]);
    /// assert!(tree.find(2).is_some());
    /// assert_eq!(tree.find(4), None);
    /// ```
    #[must_use]
    pub fn find(&self, key: Key) -> Option<NodeHandle> {
        self.raw.find(key).map(|slot| self.handle(slot))
    }

    /// Returns true if the tree holds at least one node with `key`.
    #[must_use]
    pub fn contains(&self, key: Key) -> bool {
        self.raw.find(key).is_some()
    }

    /// Returns the node with the smallest key.
    ///
    /// # Examples
    ///
    /// ```
    /// use sentinel_rbtree::OrderedTree;
    ///
    /// let mut tree = OrderedTree::new();
    /// assert_eq!(tree.min(), None);
    /// tree.extend([5, -3, 12]);
    /// assert_eq!(tree.node(tree.min().unwrap())?.key(), -3);
    /// assert_eq!(tree.node(tree.max().unwrap())?.key(), 12);
    /// # Ok::<(), sentinel_rbtree::TreeError>(())
    /// ```
    #[must_use]
    pub fn min(&self) -> Option<NodeHandle> {
        self.real(self.raw.subtree_min(self.raw.root()))
    }

    /// Returns the node with the largest key.
    #[must_use]
    pub fn max(&self) -> Option<NodeHandle> {
        self.real(self.raw.subtree_max(self.raw.root()))
    }

    /// Returns the node with the smallest key in the subtree rooted at `subtree`.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::ForeignHandle`] or [`TreeError::StaleHandle`] if `subtree` does
    /// not name a node of this tree.
    pub fn subtree_min(&self, subtree: NodeHandle) -> Result<NodeHandle, TreeError> {
        let slot = self.resolve(subtree)?;
        Ok(self.handle(self.raw.subtree_min(slot)))
    }

    /// Returns the node with the largest key in the subtree rooted at `subtree`.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::ForeignHandle`] or [`TreeError::StaleHandle`] if `subtree` does
    /// not name a node of this tree.
    pub fn subtree_max(&self, subtree: NodeHandle) -> Result<NodeHandle, TreeError> {
        let slot = self.resolve(subtree)?;
        Ok(self.handle(self.raw.subtree_max(slot)))
    }

    /// Returns the node that follows `node` in key order.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::ForeignHandle`] or [`TreeError::StaleHandle`] if `node` does
    /// not name a node of this tree.
    ///
    /// # Examples
    ///
    /// ```
    /// use sentinel_rbtree::OrderedTree;
    ///
    /// let tree = OrderedTree::from([1, 5, 9]);
    /// let five = tree.find(5).unwrap();
    /// let next = tree.successor(five)?.unwrap();
    /// assert_eq!(tree.node(next)?.key(), 9);
    /// assert_eq!(tree.successor(next)?, None);
    /// # Ok::<(), sentinel_rbtree::TreeError>(())
    /// ```
    pub fn successor(&self, node: NodeHandle) -> Result<Option<NodeHandle>, TreeError> {
        let slot = self.resolve(node)?;
        Ok(self.real(self.raw.step(slot, Direction::Right)))
    }

    /// Returns the node that precedes `node` in key order.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::ForeignHandle`] or [`TreeError::StaleHandle`] if `node` does
    /// not name a node of this tree.
    pub fn predecessor(&self, node: NodeHandle) -> Result<Option<NodeHandle>, TreeError> {
        let slot = self.resolve(node)?;
        Ok(self.real(self.raw.step(slot, Direction::Left)))
    }

    /// Removes `node` from the tree and returns its key.
    ///
    /// Handles to every other node remain valid.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::ForeignHandle`] if `node` came from another tree and
    /// [`TreeError::StaleHandle`] if it was already erased. The tree is unchanged in both cases.
    ///
    /// # Complexity
    ///
    /// O(log n)
    ///
    /// # Examples
    ///
    /// ```
    /// use sentinel_rbtree::{OrderedTree, TreeError};
    ///
    /// let mut tree = OrderedTree::from([1, 2, 3]);
    /// let two = tree.find(2).unwrap();
    /// assert_eq!(tree.erase(two), Ok(2));
    /// assert_eq!(tree.erase(two), Err(TreeError::StaleHandle));
    /// assert_eq!(tree.to_vec(), [1, 3]);
    /// ```
    pub fn erase(&mut self, node: NodeHandle) -> Result<Key, TreeError> {
        let slot = self.resolve(node)?;
        Ok(self.raw.erase(slot))
    }

    /// Removes one node holding `key` and returns the key, or `None` if it is absent.
    ///
    /// # Examples
    ///
    /// ```
    /// use sentinel_rbtree::OrderedTree;
    ///
    /// let mut tree = OrderedTree::from([4, 4]);
    /// assert_eq!(tree.remove(4), Some(4));
    /// assert_eq!(tree.remove(4), Some(4));
    /// assert_eq!(tree.remove(4), None);
    /// ```
    pub fn remove(&mut self, key: Key) -> Option<Key> {
        let slot = self.raw.find(key)?;
        Some(self.raw.erase(slot))
    }

    /// Removes and returns the smallest key.
    pub fn pop_first(&mut self) -> Option<Key> {
        let slot = self.real_slot(self.raw.subtree_min(self.raw.root()))?;
        Some(self.raw.erase(slot))
    }

    /// Removes and returns the largest key.
    pub fn pop_last(&mut self) -> Option<Key> {
        let slot = self.real_slot(self.raw.subtree_max(self.raw.root()))?;
        Some(self.raw.erase(slot))
    }

    /// Returns the root node, or `None` if the tree is empty.
    #[must_use]
    pub fn root(&self) -> Option<NodeHandle> {
        self.real(self.raw.root())
    }

    /// Returns a view of `node` for reading its key, color and links.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::ForeignHandle`] or [`TreeError::StaleHandle`] if `node` does
    /// not name a node of this tree.
    ///
    /// # Examples
    ///
    /// ```
    /// use sentinel_rbtree::{Color, OrderedTree};
    ///
    /// let tree = OrderedTree::from([2, 1]);
    /// let root = tree.node(tree.root().unwrap())?;
    /// assert_eq!(root.key(), 2);
    /// assert_eq!(root.color(), Color::Black);
    /// assert_eq!(root.left().map(|n| n.key()), Some(1));
    /// assert!(root.right().is_none());
    /// # Ok::<(), sentinel_rbtree::TreeError>(())
    /// ```
    pub fn node(&self, node: NodeHandle) -> Result<NodeRef<'_>, TreeError> {
        let slot = self.resolve(node)?;
        Ok(NodeRef { tree: self, slot })
    }

    /// Copies the keys in ascending order into `out`, stopping when `out` is full.
    ///
    /// Returns the number of keys written; nothing past that index is touched.
    ///
    /// # Examples
    ///
    /// ```
    /// use sentinel_rbtree::OrderedTree;
    ///
    /// let tree = OrderedTree::from([30, 10, 20]);
    /// let mut out = [0; 2];
    /// assert_eq!(tree.to_sorted_sequence(&mut out), 2);
    /// assert_eq!(out, [10, 20]);
    /// ```
    pub fn to_sorted_sequence(&self, out: &mut [Key]) -> usize {
        self.raw.write_in_order(out)
    }

    /// Returns every key in ascending order.
    #[must_use]
    pub fn to_vec(&self) -> alloc::vec::Vec<Key> {
        self.iter().collect()
    }

    /// Gets an iterator over the keys in ascending order.
    ///
    /// # Examples
    ///
    /// ```
    /// use sentinel_rbtree::OrderedTree;
    ///
    /// let tree = OrderedTree::from([2, 3, 1, 2]);
    /// let keys: Vec<_> = tree.iter().collect();
    /// assert_eq!(keys, [1, 2, 2, 3]);
    /// ```
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            raw: &self.raw,
            front: self.raw.subtree_min(self.raw.root()),
            back: self.raw.subtree_max(self.raw.root()),
            remaining: self.raw.len(),
        }
    }

    fn handle(&self, slot: Handle) -> NodeHandle {
        NodeHandle {
            tree: self.id,
            slot,
            generation: self.raw.generation(slot),
        }
    }

    fn real_slot(&self, slot: Handle) -> Option<Handle> {
        if self.raw.is_nil(slot) { None } else { Some(slot) }
    }

    fn real(&self, slot: Handle) -> Option<NodeHandle> {
        self.real_slot(slot).map(|slot| self.handle(slot))
    }

    fn resolve(&self, node: NodeHandle) -> Result<Handle, TreeError> {
        if node.tree != self.id {
            warn!("rejected handle from tree {:?} in tree {:?}", node.tree, self.id);
            return Err(TreeError::ForeignHandle);
        }
        if !self.raw.is_live(node.slot, node.generation) {
            warn!("rejected stale handle {:?}", node.slot);
            return Err(TreeError::StaleHandle);
        }
        Ok(node.slot)
    }
}

impl<'a> NodeRef<'a> {
    /// The node's key.
    #[must_use]
    pub fn key(&self) -> Key {
        self.tree.raw.key(self.slot)
    }

    /// The node's color.
    #[must_use]
    pub fn color(&self) -> Color {
        self.tree.raw.color(self.slot)
    }

    /// A handle to this node.
    #[must_use]
    pub fn handle(&self) -> NodeHandle {
        self.tree.handle(self.slot)
    }

    /// The node's parent, or `None` for the root.
    #[must_use]
    pub fn parent(&self) -> Option<NodeRef<'a>> {
        self.link(self.tree.raw.parent(self.slot))
    }

    /// The node's left child, if any.
    #[must_use]
    pub fn left(&self) -> Option<NodeRef<'a>> {
        self.link(self.tree.raw.child(self.slot, Direction::Left))
    }

    /// The node's right child, if any.
    #[must_use]
    pub fn right(&self) -> Option<NodeRef<'a>> {
        self.link(self.tree.raw.child(self.slot, Direction::Right))
    }

    fn link(&self, slot: Handle) -> Option<NodeRef<'a>> {
        let tree = self.tree;
        tree.real_slot(slot).map(|slot| NodeRef { tree, slot })
    }
}

impl fmt::Debug for NodeRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeRef").field("key", &self.key()).field("color", &self.color()).finish()
    }
}

impl fmt::Debug for OrderedTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl Default for OrderedTree {
    fn default() -> Self {
        OrderedTree::new()
    }
}

impl FromIterator<Key> for OrderedTree {
    fn from_iter<T: IntoIterator<Item = Key>>(iter: T) -> Self {
        let mut tree = OrderedTree::new();
        tree.extend(iter);
        tree
    }
}

impl Extend<Key> for OrderedTree {
    /// # Panics
    ///
    /// Panics if a node cannot be allocated.
    fn extend<T: IntoIterator<Item = Key>>(&mut self, iter: T) {
        for key in iter {
            if let Err(err) = self.insert(key) {
                panic!("`OrderedTree::extend()` - {err}");
            }
        }
    }
}

impl<const N: usize> From<[Key; N]> for OrderedTree {
    fn from(keys: [Key; N]) -> Self {
        let mut tree = OrderedTree::with_capacity(N);
        tree.extend(keys);
        tree
    }
}

impl<'a> IntoIterator for &'a OrderedTree {
    type Item = Key;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Iter<'a> {
        self.iter()
    }
}

impl Iterator for Iter<'_> {
    type Item = Key;

    fn next(&mut self) -> Option<Key> {
        if self.remaining == 0 {
            return None;
        }
        let key = self.raw.key(self.front);
        self.remaining -= 1;
        self.front = self.raw.step(self.front, Direction::Right);
        Some(key)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl DoubleEndedIterator for Iter<'_> {
    fn next_back(&mut self) -> Option<Key> {
        if self.remaining == 0 {
            return None;
        }
        let key = self.raw.key(self.back);
        self.remaining -= 1;
        self.back = self.raw.step(self.back, Direction::Left);
        Some(key)
    }
}

impl ExactSizeIterator for Iter<'_> {
    fn len(&self) -> usize {
        self.remaining
    }
}

impl FusedIterator for Iter<'_> {}
