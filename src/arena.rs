/*
Slab-style arena with a free list. Handles are stable integer indices, so
chain links (block -> next block) and back-references (node -> parent) are
plain indices instead of shared/weak pointers, which keeps the block chains
and the tree free of ownership cycles.
*/

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(transparent)]
pub(crate) struct Handle(u32);

impl Handle {
    pub(crate) const MAX: usize = u32::MAX as usize;

    #[inline]
    pub(crate) fn from_index(index: usize) -> Self {
        debug_assert!(index < Self::MAX);
        Handle(index as u32)
    }

    #[inline]
    pub(crate) fn to_index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug)]
pub(crate) struct Arena<T> {
    slots: Vec<Option<T>>,
    free: Vec<Handle>,
}

impl<T> Arena<T> {
    pub(crate) fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub(crate) fn alloc(&mut self, element: T) -> Handle {
        if let Some(h) = self.free.pop() {
            self.slots[h.to_index()] = Some(element);
            h
        } else {
            assert!(self.slots.len() < Handle::MAX, "arena is at maximum capacity");
            self.slots.push(Some(element));
            Handle::from_index(self.slots.len() - 1)
        }
    }

    #[inline]
    pub(crate) fn get(&self, handle: Handle) -> &T {
        self.slots[handle.to_index()].as_ref().expect("stale arena handle")
    }

    #[inline]
    pub(crate) fn get_mut(&mut self, handle: Handle) -> &mut T {
        self.slots[handle.to_index()].as_mut().expect("stale arena handle")
    }

    /// Mutable access to two distinct slots at once.
    pub(crate) fn get2_mut(&mut self, a: Handle, b: Handle) -> (&mut T, &mut T) {
        let (i, j) = (a.to_index(), b.to_index());
        assert_ne!(i, j, "handles must be distinct");
        if i < j {
            let (lo, hi) = self.slots.split_at_mut(j);
            (
                lo[i].as_mut().expect("stale arena handle"),
                hi[0].as_mut().expect("stale arena handle"),
            )
        } else {
            let (lo, hi) = self.slots.split_at_mut(i);
            (
                hi[0].as_mut().expect("stale arena handle"),
                lo[j].as_mut().expect("stale arena handle"),
            )
        }
    }

    pub(crate) fn free(&mut self, handle: Handle) {
        let slot = self.slots[handle.to_index()].take();
        assert!(slot.is_some(), "double free of arena handle");
        self.free.push(handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_get_free_reuse() {
        let mut arena: Arena<u32> = Arena::new();
        let a = arena.alloc(1);
        let b = arena.alloc(2);
        assert_eq!(arena.len(), 2);
        assert_eq!(*arena.get(a), 1);
        assert_eq!(*arena.get(b), 2);

        arena.free(a);
        assert_eq!(arena.len(), 1);

        // Freed slot is reused.
        let c = arena.alloc(3);
        assert_eq!(c, a);
        assert_eq!(*arena.get(c), 3);
        assert_eq!(*arena.get(b), 2);
    }

    #[test]
    fn get2_mut_either_order() {
        let mut arena: Arena<u32> = Arena::new();
        let a = arena.alloc(10);
        let b = arena.alloc(20);

        let (x, y) = arena.get2_mut(a, b);
        std::mem::swap(x, y);
        assert_eq!(*arena.get(a), 20);
        assert_eq!(*arena.get(b), 10);

        let (x, y) = arena.get2_mut(b, a);
        std::mem::swap(x, y);
        assert_eq!(*arena.get(a), 10);
        assert_eq!(*arena.get(b), 20);
    }

    #[test]
    #[should_panic(expected = "stale arena handle")]
    fn stale_handle_panics() {
        let mut arena: Arena<u32> = Arena::new();
        let a = arena.alloc(1);
        arena.free(a);
        let _ = arena.get(a);
    }
}
