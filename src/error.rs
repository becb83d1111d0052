/// Errors reported by [`OrderedTree`](crate::OrderedTree).
///
/// Lookup misses are not errors; [`find`](crate::OrderedTree::find), [`min`](crate::OrderedTree::min)
/// and [`max`](crate::OrderedTree::max) return `None` instead.
#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
pub enum TreeError {
    /// The node arena could not grow.
    #[error("node allocation failed")]
    AllocationFailed,

    /// Every addressable node slot is already in use.
    #[error("tree is at maximum capacity ({max} nodes)")]
    CapacityExceeded {
        /// The number of nodes a single tree can hold.
        max: usize,
    },

    /// The handle was issued by a different tree.
    #[error("node handle belongs to a different tree")]
    ForeignHandle,

    /// The node named by the handle has already been erased.
    #[error("node handle refers to an erased node")]
    StaleHandle,
}
