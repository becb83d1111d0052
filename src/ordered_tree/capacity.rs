use super::OrderedTree;
use crate::error::TreeError;
use crate::raw::RawRbTree;

impl OrderedTree {
    /// Creates an empty tree with room for at least `capacity` nodes.
    ///
    /// # Panics
    ///
    /// Panics if the memory cannot be allocated. Use
    /// [`try_with_capacity`](OrderedTree::try_with_capacity) to handle that case.
    ///
    /// # Examples
    ///
    /// ```
    /// use sentinel_rbtree::OrderedTree;
    ///
    /// let tree = OrderedTree::with_capacity(32);
    /// assert!(tree.is_empty());
    /// assert!(tree.capacity() >= 32);
    /// ```
    ///
    /// # Complexity
    ///
    /// O(capacity) for memory allocation.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self::try_with_capacity(capacity).unwrap_or_else(|err| panic!("`OrderedTree::with_capacity()` - {err}"))
    }

    /// Creates an empty tree with room for at least `capacity` nodes.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::AllocationFailed`] if the memory cannot be allocated.
    pub fn try_with_capacity(capacity: usize) -> Result<Self, TreeError> {
        Ok(Self::from_raw(RawRbTree::try_with_capacity(capacity)?))
    }

    /// Returns how many nodes the tree can hold before it has to reallocate.
    ///
    /// # Complexity
    ///
    /// O(1)
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.raw.capacity()
    }

    /// Reserves room for at least `additional` more nodes.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::AllocationFailed`] if the memory cannot be allocated. The tree is
    /// unchanged in that case.
    ///
    /// # Examples
    ///
    /// ```
    /// use sentinel_rbtree::OrderedTree;
    ///
    /// let mut tree = OrderedTree::from([1]);
    /// tree.try_reserve(100)?;
    /// assert!(tree.capacity() >= 101);
    /// # Ok::<(), sentinel_rbtree::TreeError>(())
    /// ```
    pub fn try_reserve(&mut self, additional: usize) -> Result<(), TreeError> {
        self.raw.try_reserve(additional)
    }
}
