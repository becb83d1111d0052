use alloc::vec::Vec;
use log::debug;

use super::handle::{Generation, Handle};
use crate::error::TreeError;

struct Slot<T> {
    generation: Generation,
    element: Option<T>,
}

/// Slot storage for tree nodes.
///
/// Freed slots are reused, and each reuse bumps the slot's [`Generation`] so
/// callers holding an old `(Handle, Generation)` pair can detect it. A slot
/// whose generation is exhausted is retired instead of reused.
pub(crate) struct Arena<T> {
    slots: Vec<Slot<T>>,
    free: Vec<Handle>,
    retired: usize,
}

impl<T> Arena<T> {
    pub(crate) const fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            retired: 0,
        }
    }

    pub(crate) fn try_with_capacity(capacity: usize) -> Result<Self, TreeError> {
        let mut arena = Self::new();
        arena.try_reserve(capacity)?;
        Ok(arena)
    }

    pub(crate) fn capacity(&self) -> usize {
        self.slots.capacity()
    }

    pub(crate) const fn len(&self) -> usize {
        self.slots.len().saturating_sub(self.free.len() + self.retired)
    }

    /// Makes room for `additional` more elements without reallocating.
    pub(crate) fn try_reserve(&mut self, additional: usize) -> Result<(), TreeError> {
        let wanted = additional.saturating_sub(self.free.len());
        self.slots.try_reserve(wanted).map_err(|_| TreeError::AllocationFailed)?;
        // `take` pushes onto `free`, keep it from ever having to allocate.
        let free_room = self.slots.capacity().saturating_sub(self.free.len());
        self.free.try_reserve(free_room).map_err(|_| TreeError::AllocationFailed)
    }

    pub(crate) fn try_alloc(&mut self, element: T) -> Result<Handle, TreeError> {
        if let Some(h) = self.free.pop() {
            // Reuse a free slot/handle, its generation was bumped when it was freed.
            let slot = &mut self.slots[h.to_index()];
            debug_assert!(slot.element.is_none(), "`Arena::try_alloc()` - free slot is occupied!");
            slot.element = Some(element);
            return Ok(h);
        }

        let handle = Handle::try_from_index(self.slots.len()).ok_or(TreeError::CapacityExceeded {
            max: Handle::MAX,
        })?;
        if self.slots.len() == self.slots.capacity() {
            self.try_reserve(1)?;
        }
        self.slots.push(Slot {
            generation: Generation::default(),
            element: Some(element),
        });
        Ok(handle)
    }

    #[inline]
    pub(crate) fn get(&self, handle: Handle) -> &T {
        self.slots[handle.to_index()].element.as_ref().expect("`Arena::get()` - `handle` is invalid!")
    }

    #[inline]
    pub(crate) fn get_mut(&mut self, handle: Handle) -> &mut T {
        self.slots[handle.to_index()].element.as_mut().expect("`Arena::get_mut()` - `handle` is invalid!")
    }

    /// Returns the element only if `handle` is live and still carries `generation`.
    #[inline]
    pub(crate) fn get_checked(&self, handle: Handle, generation: Generation) -> Option<&T> {
        let slot = self.slots.get(handle.to_index())?;
        if slot.generation == generation {
            slot.element.as_ref()
        } else {
            None
        }
    }

    #[inline]
    pub(crate) fn generation(&self, handle: Handle) -> Generation {
        self.slots[handle.to_index()].generation
    }

    pub(crate) fn take(&mut self, handle: Handle) -> T {
        let slot = &mut self.slots[handle.to_index()];
        let element = slot.element.take().expect("`Arena::take()` - `handle` is invalid!");
        if let Some(generation) = slot.generation.next() {
            slot.generation = generation;
            self.free.push(handle);
        } else {
            debug!("`Arena::take()` - retiring slot {} with exhausted generation", handle.to_index());
            self.retired += 1;
        }
        element
    }

    pub(crate) fn free(&mut self, handle: Handle) {
        drop(self.take(handle));
    }
}
