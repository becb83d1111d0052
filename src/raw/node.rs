use super::handle::Handle;
use crate::Key;

/// The color of a node.
///
/// The sentinel is always [`Color::Black`], and so is the root once an operation completes.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Color {
    /// A red node; its children are black.
    Red,
    /// A black node; counted by the black-height rule.
    Black,
}

impl Color {
    /// Single-letter tag used by the structure dump.
    pub(crate) const fn tag(self) -> char {
        match self {
            Color::Red => 'r',
            Color::Black => 'b',
        }
    }
}

/// Which child slot of a node.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Direction {
    Left,
    Right,
}

impl Direction {
    #[inline]
    pub(crate) const fn opposite(self) -> Self {
        match self {
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
        }
    }
}

/// A node record in the arena.
///
/// Every link is a [`Handle`]; missing children and the root's parent point at the tree's sentinel.
pub(crate) struct Node {
    key: Key,
    color: Color,
    parent: Handle,
    // Indexed by `Direction`.
    children: [Handle; 2],
}

impl Node {
    /// Creates a detached node whose links all point at `nil`.
    pub(crate) const fn new(key: Key, color: Color, nil: Handle) -> Self {
        Self {
            key,
            color,
            parent: nil,
            children: [nil, nil],
        }
    }

    #[inline]
    pub(crate) const fn key(&self) -> Key {
        self.key
    }

    #[inline]
    pub(crate) const fn color(&self) -> Color {
        self.color
    }

    #[inline]
    pub(crate) fn set_color(&mut self, color: Color) {
        self.color = color;
    }

    #[inline]
    pub(crate) const fn parent(&self) -> Handle {
        self.parent
    }

    #[inline]
    pub(crate) fn set_parent(&mut self, parent: Handle) {
        self.parent = parent;
    }

    #[inline]
    pub(crate) const fn child(&self, dir: Direction) -> Handle {
        self.children[dir as usize]
    }

    #[inline]
    pub(crate) fn set_child(&mut self, dir: Direction, child: Handle) {
        self.children[dir as usize] = child;
    }
}
