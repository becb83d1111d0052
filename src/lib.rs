//! An arena-backed red-black tree for Rust.
//!
//! This crate provides [`OrderedTree`], an ordered multiset of integer keys with guaranteed
//! O(log n) insert, erase and lookup:
//!
//! - [`insert`](OrderedTree::insert) returns a [`NodeHandle`] to the new node
//! - [`find`](OrderedTree::find), [`min`](OrderedTree::min) and [`max`](OrderedTree::max)
//!   locate nodes; [`erase`](OrderedTree::erase) removes one by handle
//! - [`to_sorted_sequence`](OrderedTree::to_sorted_sequence) copies the keys, in order, into a
//!   caller-provided buffer
//!
//! # Example
//!
//! ```
//! use sentinel_rbtree::{Color, OrderedTree};
//!
//! let mut tree = OrderedTree::new();
//! for key in [10, 20, 30] {
//!     tree.insert(key)?;
//! }
//!
//! // Three ascending inserts rotate 20 up to the root.
//! let root = tree.node(tree.root().unwrap())?;
//! assert_eq!(root.key(), 20);
//! assert_eq!(root.color(), Color::Black);
//!
//! let mut keys = [0; 2];
//! assert_eq!(tree.to_sorted_sequence(&mut keys), 2);
//! assert_eq!(keys, [10, 20]);
//! # Ok::<(), sentinel_rbtree::TreeError>(())
//! ```
//!
//! # Features
//!
//! - **`no_std` compatible** - Only requires `alloc`, no standard library dependency
//! - **Checked handles** - Handles from another tree, or to an erased node, are rejected with
//!   a [`TreeError`] rather than corrupting the structure
//! - **Fallible allocation** - Allocation failure surfaces as [`TreeError::AllocationFailed`]
//!
//! # Implementation
//!
//! Nodes live in a slot arena and link to each other by index. Every absent child, and the
//! root's parent, is a single black sentinel record, so rotations and fixups never test for a
//! missing node. Left and right cases share one code path parameterized by direction.
//!
//! Diagnostics go through the [`log`] facade at `trace`, `debug` and `warn` levels.

#![no_std]
#![forbid(unsafe_code)]
#![forbid(keyword_idents)]
#![forbid(non_ascii_idents)]
#![forbid(unreachable_pub)]
#![warn(clippy::all)]
#![warn(clippy::cargo)]
#![warn(clippy::pedantic)]
// Enable coverage attributes for nightly builds.
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

extern crate alloc;

mod error;
mod raw;

pub mod ordered_tree;

pub use error::TreeError;
pub use ordered_tree::{NodeHandle, NodeRef, OrderedTree};
pub use raw::Color;

/// The key type stored in an [`OrderedTree`].
pub type Key = i64;
