//! Rotating per-frame uniform state.
//!
//! The ring owns K slots of [`FrameUniforms`] plus a wrapping cursor. Each
//! frame advances the cursor by one and gets exclusive write access to the
//! new slot, so CPU writes for frame N+1 never touch memory a pass of frame
//! N is still reading. Slots are plain structs in an owned array; the
//! byte-offset translation needed to bind a slot for GPU reads is carried on
//! the handle and consumed only at the submission boundary.

use crate::uniforms::FrameUniforms;

/// Default uniform-buffer offset alignment when no device limit is supplied.
pub const DEFAULT_UNIFORM_ALIGNMENT: u32 = 256;

/// Exclusive write access to one ring slot for one frame.
///
/// Callers must not retain a handle past the next
/// [`FrameResourceRing::acquire_next_slot`] call made for a different frame;
/// after K further rotations the slot's memory is reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SlotHandle {
    index: usize,
    byte_offset: u64,
}

impl SlotHandle {
    /// Slot index in `0..slot_count`.
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Byte offset of this slot inside the GPU-side uniform ring buffer.
    #[must_use]
    pub fn byte_offset(&self) -> u64 {
        self.byte_offset
    }

    /// The same offset as a `u32` dynamic bind offset.
    #[must_use]
    pub fn dynamic_offset(&self) -> u32 {
        self.byte_offset as u32
    }
}

/// Ring of K per-frame uniform slots with a wrapping cursor.
///
/// K equals the maximum number of concurrently in-flight frames; combined
/// with a gate of the same capacity, no two unfinished frames ever share a
/// slot, so memory overhead stays O(K) regardless of how many frames render.
pub struct FrameResourceRing {
    slots: Vec<FrameUniforms>,
    cursor: usize,
    stride: u32,
}

impl FrameResourceRing {
    /// Creates a ring with `slot_count` slots, each padded to
    /// `min_uniform_alignment` bytes (the device's
    /// `min_uniform_buffer_offset_alignment`).
    ///
    /// # Panics
    ///
    /// Panics if `slot_count` is zero.
    #[must_use]
    pub fn new(slot_count: usize, min_uniform_alignment: u32) -> Self {
        assert!(slot_count >= 1, "ring needs at least one slot");
        Self {
            slots: vec![FrameUniforms::default(); slot_count],
            cursor: 0,
            stride: FrameUniforms::slot_stride(min_uniform_alignment),
        }
    }

    /// Number of rotating slots (K).
    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Aligned byte stride of one slot.
    #[must_use]
    pub fn stride(&self) -> u32 {
        self.stride
    }

    /// Total size of the matching GPU-side uniform ring buffer.
    #[must_use]
    pub fn buffer_size(&self) -> u64 {
        u64::from(self.stride) * self.slots.len() as u64
    }

    /// Advances the cursor by one (mod K) and hands out the slot it lands
    /// on. Calling this K times returns to the original slot index.
    pub fn acquire_next_slot(&mut self) -> SlotHandle {
        let index = self.cursor;
        self.cursor = (self.cursor + 1) % self.slots.len();
        SlotHandle {
            index,
            byte_offset: index as u64 * u64::from(self.stride),
        }
    }

    /// Mutable access to a slot's uniform data.
    pub fn uniforms_mut(&mut self, slot: &SlotHandle) -> &mut FrameUniforms {
        &mut self.slots[slot.index]
    }

    /// Read access to a slot's uniform data.
    #[must_use]
    pub fn uniforms(&self, slot: &SlotHandle) -> &FrameUniforms {
        &self.slots[slot.index]
    }

    /// The raw bytes of one slot, for upload at the submission boundary.
    #[must_use]
    pub fn slot_bytes(&self, slot: &SlotHandle) -> &[u8] {
        bytemuck::bytes_of(&self.slots[slot.index])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotation_returns_to_origin_after_k_steps() {
        for k in 1..=5 {
            let mut ring = FrameResourceRing::new(k, DEFAULT_UNIFORM_ALIGNMENT);
            let first = ring.acquire_next_slot().index();
            for _ in 0..k - 1 {
                ring.acquire_next_slot();
            }
            assert_eq!(ring.acquire_next_slot().index(), first);
        }
    }

    #[test]
    fn consecutive_slots_are_distinct() {
        let mut ring = FrameResourceRing::new(3, DEFAULT_UNIFORM_ALIGNMENT);
        let a = ring.acquire_next_slot();
        let b = ring.acquire_next_slot();
        let c = ring.acquire_next_slot();
        assert_ne!(a.index(), b.index());
        assert_ne!(b.index(), c.index());
        assert_ne!(a.index(), c.index());
    }

    #[test]
    fn offsets_follow_aligned_stride() {
        let mut ring = FrameResourceRing::new(3, DEFAULT_UNIFORM_ALIGNMENT);
        assert_eq!(ring.stride() % DEFAULT_UNIFORM_ALIGNMENT, 0);
        for expected in 0..3u64 {
            let slot = ring.acquire_next_slot();
            assert_eq!(slot.byte_offset(), expected * u64::from(ring.stride()));
        }
        assert_eq!(ring.buffer_size(), 3 * u64::from(ring.stride()));
    }

    #[test]
    fn slot_writes_land_in_their_own_slot() {
        let mut ring = FrameResourceRing::new(2, DEFAULT_UNIFORM_ALIGNMENT);
        let a = ring.acquire_next_slot();
        ring.uniforms_mut(&a).frame_index = 7;
        let b = ring.acquire_next_slot();
        ring.uniforms_mut(&b).frame_index = 8;
        assert_eq!(ring.uniforms(&a).frame_index, 7);
        assert_eq!(ring.uniforms(&b).frame_index, 8);
    }

    #[test]
    fn slot_bytes_match_uniform_content() {
        let mut ring = FrameResourceRing::new(1, 1);
        let slot = ring.acquire_next_slot();
        ring.uniforms_mut(&slot).frame_index = 42;
        let bytes = ring.slot_bytes(&slot);
        assert_eq!(bytes.len(), std::mem::size_of::<FrameUniforms>());
        let round_trip: &FrameUniforms = bytemuck::from_bytes(bytes);
        assert_eq!(round_trip.frame_index, 42);
    }
}
