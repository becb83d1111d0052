use core::num::NonZero;

#[cfg(test)]
type RawHandle = u16;
#[cfg(not(test))]
type RawHandle = u32;

/// Index of a node record in the tree's arena.
///
/// Stored as `index + 1` so `Option<Handle>` costs nothing extra.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
#[repr(transparent)]
pub(crate) struct Handle(NonZero<RawHandle>);

impl Handle {
    /// Largest index a handle can address; one slot of the arena is the sentinel.
    pub(crate) const MAX: usize = (RawHandle::MAX - 1) as usize;

    #[inline]
    pub(crate) const fn from_index(index: usize) -> Self {
        assert!(index <= Self::MAX, "`Handle::from_index()` - `index` > `Handle::MAX`!");
        // `index + 1` is non-zero and fits, `index <= MAX` was checked above.
        #[allow(clippy::cast_possible_truncation)]
        Self(NonZero::new((index + 1) as RawHandle).unwrap())
    }

    /// Like [`Handle::from_index`], but reports an out-of-range index instead of panicking.
    #[inline]
    pub(crate) const fn try_from_index(index: usize) -> Option<Self> {
        if index > Self::MAX {
            None
        } else {
            Some(Self::from_index(index))
        }
    }

    #[inline]
    pub(crate) const fn to_index(self) -> usize {
        (self.0.get() - 1) as usize
    }
}

/// Reuse counter of an arena slot.
///
/// Bumped every time the slot is freed, so a handle captured before the free
/// no longer matches once the slot hosts a different node. A generation is
/// never reused: once it runs out the arena retires the slot.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub(crate) struct Generation(u32);

impl Generation {
    #[cfg(test)]
    pub(crate) const LAST: Self = Self(u32::MAX);

    /// The following generation, or `None` once the counter is exhausted.
    #[inline]
    #[must_use]
    pub(crate) const fn next(self) -> Option<Self> {
        match self.0.checked_add(1) {
            Some(next) => Some(Self(next)),
            None => None,
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use static_assertions::assert_eq_size;

    // Verify our assumptions about `Handle` and the niche optimization.
    assert_eq_size!(Handle, Option<Handle>);
    assert_eq_size!(Handle, RawHandle);

    #[test]
    #[should_panic(expected = "`Handle::from_index()` - `index` > `Handle::MAX`!")]
    fn invalid_handle() {
        let _ = Handle::from_index(Handle::MAX + 1);
    }

    #[test]
    fn try_from_index_rejects_overflow() {
        assert_eq!(Handle::try_from_index(Handle::MAX + 1), None);
        assert_eq!(Handle::try_from_index(Handle::MAX).map(Handle::to_index), Some(Handle::MAX));
    }

    #[test]
    fn generation_never_wraps() {
        assert_eq!(Generation::LAST.next(), None);
        assert_eq!(Generation::default().next(), Some(Generation(1)));
    }

    proptest! {
        #[test]
        fn handle_round_trip(index in 0..=Handle::MAX) {
            let handle = Handle::from_index(index);
            prop_assert_eq!(handle.to_index(), index);
        }
    }
}
