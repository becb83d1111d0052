mod arena;
mod handle;
mod node;
mod raw_rbtree;

pub(crate) use handle::{Generation, Handle};
pub use node::Color;
pub(crate) use node::Direction;
pub(crate) use raw_rbtree::RawRbTree;
