//! Two-slot arena with an explicit active index

use crate::decode::DecodeSlot;

/// Index of a slot in the arena
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotIndex {
    A,
    B,
}

impl SlotIndex {
    #[inline]
    pub fn other(self) -> Self {
        match self {
            SlotIndex::A => SlotIndex::B,
            SlotIndex::B => SlotIndex::A,
        }
    }

    #[inline]
    fn index(self) -> usize {
        match self {
            SlotIndex::A => 0,
            SlotIndex::B => 1,
        }
    }
}

/// At most two decode slots: one active for display, one preloading
#[derive(Debug)]
pub struct SlotArena {
    slots: [DecodeSlot; 2],
    active: SlotIndex,
}

impl Default for SlotArena {
    fn default() -> Self {
        Self::new()
    }
}

impl SlotArena {
    pub fn new() -> Self {
        Self {
            slots: [DecodeSlot::empty(), DecodeSlot::empty()],
            active: SlotIndex::A,
        }
    }

    #[inline]
    pub fn active_index(&self) -> SlotIndex {
        self.active
    }

    #[inline]
    pub fn active(&self) -> &DecodeSlot {
        &self.slots[self.active.index()]
    }

    #[inline]
    pub fn active_mut(&mut self) -> &mut DecodeSlot {
        &mut self.slots[self.active.index()]
    }

    #[inline]
    pub fn preload(&self) -> &DecodeSlot {
        &self.slots[self.active.other().index()]
    }

    #[inline]
    pub fn preload_mut(&mut self) -> &mut DecodeSlot {
        &mut self.slots[self.active.other().index()]
    }

    /// Discard the active slot and put `slot` in its place
    pub fn replace_active(&mut self, slot: DecodeSlot) {
        *self.active_mut() = slot;
    }

    /// Discard the preloading slot and put `slot` in its place
    pub fn replace_preload(&mut self, slot: DecodeSlot) {
        *self.preload_mut() = slot;
    }

    /// Promote the preloading slot to active
    ///
    /// Only a slot that has produced pictures can be promoted. The old
    /// active slot is dropped in the same call, so there is no point where
    /// both or neither slot is active. Returns false (and changes nothing)
    /// if the preload slot is not displayable.
    pub fn promote(&mut self) -> bool {
        if !self.preload().is_displayable() {
            return false;
        }
        let old = self.active;
        self.active = old.other();
        self.slots[old.index()] = DecodeSlot::empty();
        true
    }
}
