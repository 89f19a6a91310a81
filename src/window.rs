// Copyright 2025 Dustin McAfee
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The GLZ decoder window: a slot-hashed store of previously decoded images
//! that later frames reference by id and pixel offset.
//!
//! Slots are addressed by `id mod capacity`. A new entry whose slot is
//! occupied forces a capacity doubling (power-of-two growth) and a rehash of
//! every live entry; if the collision survives that (a duplicate id), the
//! newcomer displaces and destroys whatever was there. Eviction is driven
//! entirely by the retention hint (`win_head_dist`) carried on the entry at
//! the tail of the window's densely populated prefix — not by the frame that
//! was just inserted — which deliberately lags eviction by one frame behind
//! insertion.

use crate::error::DecodeError;

/// One decoded image, held in the window for future GLZ references.
///
/// Most entries `Own` a private copy of their pixels. When a frame's
/// `win_head_dist` is `0` the encoder is telling us nothing after this frame
/// can be evicted before the *next* frame is decoded, so the window can
/// borrow the caller's own output buffer for that one frame instead of
/// copying it — this is the zero-copy path.
pub enum WindowEntry {
    /// A private, heap-owned copy of the image's BGRA pixels.
    Owned(Vec<u8>),
    /// A borrow of a buffer owned by the caller of [`crate::GlzDecoder::decode`],
    /// valid only until that call returns.
    ///
    /// # Safety
    ///
    /// The pointed-to memory must remain valid and unaliased for the
    /// lifetime of this variant. [`DecoderWindow::add_borrowed`] is the only
    /// safe-to-call constructor and it is only ever used for the frame the
    /// decoder is currently producing, which the caller guarantees outlives
    /// this window entry (see [`crate::GlzDecoder::decode`]'s contract).
    Borrowed {
        /// Pointer to the first byte of the borrowed BGRA buffer.
        ptr: *const u8,
        /// Length in bytes of the borrowed buffer.
        len: usize,
    },
}

impl WindowEntry {
    /// Returns this entry's pixels as a byte slice.
    ///
    /// # Safety
    ///
    /// For a `Borrowed` entry, the caller must ensure the original buffer
    /// the entry points to is still alive and hasn't been mutated through
    /// another reference. `WindowEntry` is a public type whose `Borrowed`
    /// variant is freely constructible outside this crate (Rust gives enum
    /// variant fields the same visibility as the enum itself, so `ptr`/`len`
    /// can't be sealed off the way a struct's private fields would be) —
    /// this method has to stay `unsafe` rather than trusting the variant was
    /// built by [`DecoderWindow::add_borrowed`]. Every call site inside this
    /// crate upholds the precondition because [`DecoderWindow`] only ever
    /// constructs `Borrowed` entries for the duration of a single decode
    /// call and replaces them with an `Owned` copy (or evicts them) before
    /// the next call that could invalidate the pointer.
    #[must_use]
    pub unsafe fn as_slice(&self) -> &[u8] {
        match self {
            WindowEntry::Owned(buf) => buf.as_slice(),
            // SAFETY: see the method-level safety notes above; the caller of
            // this unsafe fn is responsible for having upheld them.
            WindowEntry::Borrowed { ptr, len } => unsafe { std::slice::from_raw_parts(*ptr, *len) },
        }
    }
}

impl std::fmt::Debug for WindowEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WindowEntry::Owned(buf) => f.debug_tuple("Owned").field(&buf.len()).finish(),
            WindowEntry::Borrowed { len, .. } => f.debug_struct("Borrowed").field("len", len).finish(),
        }
    }
}

/// A single occupied slot: the image id it holds, its retention hint, its
/// pixel count, and its pixels.
struct Slot {
    id: u64,
    win_head_dist: u32,
    gross_pixels: u64,
    entry: WindowEntry,
}

/// The sliding-window store a [`crate::GlzDecoder`] consults for inter-image
/// references.
///
/// `capacity` is always a power of two so that `id mod capacity` reduces to
/// a mask. `oldest` is the smallest id not yet evicted; `tail_gap` is the
/// first id past the window's densely populated prefix — `[oldest,
/// tail_gap)` are all present, everything below `oldest` has been evicted.
///
/// This type is `!Send + !Sync`: a [`WindowEntry::Borrowed`] slot holds a raw
/// pointer into memory owned by whoever called `add`/`add_borrowed`, and
/// handing that across threads without re-deriving the borrow is unsound.
/// This matches the single-threaded-per-decoder contract every `GlzDecoder`
/// is built under.
pub struct DecoderWindow {
    slots: Vec<Option<Slot>>,
    capacity: usize,
    oldest: u64,
    tail_gap: u64,
}

impl std::fmt::Debug for DecoderWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecoderWindow")
            .field("capacity", &self.capacity)
            .field("oldest", &self.oldest)
            .field("tail_gap", &self.tail_gap)
            .field("occupied", &self.slots.iter().filter(|s| s.is_some()).count())
            .finish()
    }
}

const MIN_CAPACITY: usize = 16;

impl Default for DecoderWindow {
    fn default() -> Self {
        Self::new()
    }
}

impl DecoderWindow {
    /// Creates an empty window at the minimum capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity_hint(MIN_CAPACITY)
    }

    /// Creates an empty window sized to hold at least `hint` live images
    /// before its first resize. Rounded up to the next power of two, with a
    /// floor of `16`.
    #[must_use]
    pub fn with_capacity_hint(hint: usize) -> Self {
        let capacity = hint.max(MIN_CAPACITY).next_power_of_two();
        let mut slots = Vec::new();
        slots.resize_with(capacity, || None);
        DecoderWindow {
            slots,
            capacity,
            oldest: 0,
            tail_gap: 0,
        }
    }

    #[inline]
    fn slot_index(&self, id: u64) -> usize {
        (id as usize) & (self.capacity - 1)
    }

    /// Looks up the entry for image `id`, if the window still retains it.
    #[must_use]
    pub fn get(&self, id: u64) -> Option<&WindowEntry> {
        let idx = self.slot_index(id);
        self.slots[idx].as_ref().filter(|slot| slot.id == id).map(|slot| &slot.entry)
    }

    /// Resolves a GLZ inter-image reference: `current_id - distance` must
    /// name a live entry whose `gross_pixels` covers `pixel_offset`. Returns
    /// that entry's full pixel buffer (starting at pixel 0, not at
    /// `pixel_offset`) so callers referencing the same image at different
    /// offsets can share one lookup.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::ReferenceNotFound`] if `distance > current_id`,
    /// the target id is not present in the window, or the target's
    /// `gross_pixels` is smaller than `pixel_offset`.
    pub fn resolve(&self, current_id: u64, distance: u64, pixel_offset: u64) -> Result<&[u8], DecodeError> {
        let not_found = || DecodeError::ReferenceNotFound {
            current_id,
            distance,
            target_id: current_id.saturating_sub(distance),
            pixel_offset,
        };
        let target = current_id.checked_sub(distance).ok_or_else(not_found)?;
        let idx = self.slot_index(target);
        let slot = self.slots[idx].as_ref().filter(|s| s.id == target).ok_or_else(not_found)?;
        if slot.gross_pixels < pixel_offset {
            return Err(not_found());
        }
        // SAFETY: every `Borrowed` entry in this table was constructed by
        // `add_borrowed`, whose own safety contract (and `GlzDecoder::decode`'s
        // call site) keeps the pointed-to buffer alive and unmutated for
        // exactly as long as the entry is retained here.
        Ok(unsafe { slot.entry.as_slice() })
    }

    /// Stores an owned copy of `pixels` (a flat BGRA buffer) under `id`,
    /// growing the window first if its slot is occupied.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::OutOfMemory`] if growing the slot table or
    /// copying `pixels` fails to allocate.
    pub fn add(&mut self, id: u64, win_head_dist: u32, pixels: &[u8]) -> Result<(), DecodeError> {
        let mut owned = Vec::new();
        owned
            .try_reserve_exact(pixels.len())
            .map_err(|e| DecodeError::OutOfMemory { reason: e.to_string() })?;
        owned.extend_from_slice(pixels);
        self.insert(id, win_head_dist, (pixels.len() / 4) as u64, WindowEntry::Owned(owned))
    }

    /// Stores a borrowing reference to `pixels` under `id`, valid only until
    /// the caller's buffer is reused or dropped. Always recorded with
    /// `win_head_dist = 0`, matching the zero-copy contract.
    ///
    /// # Safety
    ///
    /// `pixels` must remain valid and unmutated through any other handle for
    /// as long as this entry is retained. Only call this for a frame whose
    /// `win_head_dist` is `0` and whose output buffer the caller keeps alive
    /// until it is no longer needed as a reference target (see
    /// [`crate::GlzDecoder::decode`]).
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::OutOfMemory`] if growing the slot table fails
    /// to allocate.
    pub unsafe fn add_borrowed(&mut self, id: u64, pixels: &[u8]) -> Result<(), DecodeError> {
        self.insert(
            id,
            0,
            (pixels.len() / 4) as u64,
            WindowEntry::Borrowed {
                ptr: pixels.as_ptr(),
                len: pixels.len(),
            },
        )
    }

    fn insert(&mut self, id: u64, win_head_dist: u32, gross_pixels: u64, entry: WindowEntry) -> Result<(), DecodeError> {
        let mut idx = self.slot_index(id);
        if self.slots[idx].is_some() {
            self.grow()?;
            idx = self.slot_index(id);
            if self.slots[idx].is_some() {
                // Duplicate-id collision surviving a rehash: destroy the
                // displaced entry and take its place.
                self.slots[idx] = None;
            }
        }
        self.slots[idx] = Some(Slot {
            id,
            win_head_dist,
            gross_pixels,
            entry,
        });
        self.advance_tail_gap(id);
        self.run_retention();
        Ok(())
    }

    fn grow(&mut self) -> Result<(), DecodeError> {
        let new_capacity = self
            .capacity
            .checked_mul(2)
            .ok_or_else(|| DecodeError::OutOfMemory { reason: "window capacity overflow".to_string() })?;
        let mut new_slots = Vec::new();
        new_slots
            .try_reserve_exact(new_capacity)
            .map_err(|e| DecodeError::OutOfMemory { reason: e.to_string() })?;
        new_slots.resize_with(new_capacity, || None);

        for slot in self.slots.drain(..).flatten() {
            let idx = (slot.id as usize) & (new_capacity - 1);
            new_slots[idx] = Some(slot);
        }

        self.slots = new_slots;
        self.capacity = new_capacity;
        Ok(())
    }

    /// Advances `tail_gap` past `id` as long as the next slot in sequence is
    /// occupied, extending the window's densely-populated prefix.
    fn advance_tail_gap(&mut self, id: u64) {
        while self.tail_gap <= id && self.slots[self.slot_index(self.tail_gap)].is_some() {
            self.tail_gap += 1;
        }
    }

    /// Destroys every entry with id in `[oldest, new_oldest)` and advances
    /// `oldest` to `new_oldest`. A no-op if `new_oldest <= oldest`.
    pub fn release(&mut self, new_oldest: u64) {
        while self.oldest < new_oldest {
            let idx = self.slot_index(self.oldest);
            self.slots[idx] = None;
            self.oldest += 1;
        }
    }

    /// Runs the retention policy: reads the entry sitting at the tail of the
    /// densely populated prefix and releases everything its own
    /// `win_head_dist` says is now unreachable.
    ///
    /// Reads that hint off the tail entry, not off the frame that was just
    /// inserted — a retained tail-end frame declares how far back any frame
    /// may still look, and only once *it* has become the tail does its hint
    /// take effect. This is what makes eviction lag one frame behind
    /// insertion; preserved exactly rather than reading the newest frame's
    /// own hint.
    fn run_retention(&mut self) {
        if self.tail_gap == 0 {
            return;
        }
        let idx = self.slot_index(self.tail_gap - 1);
        if let Some(tail) = &self.slots[idx] {
            let new_oldest = tail.id.saturating_sub(u64::from(tail.win_head_dist));
            self.release(new_oldest);
        }
    }

    /// Destroys every live entry and resets capacity to its minimum.
    pub fn clear(&mut self) {
        *self = DecoderWindow::new();
    }

    /// The window's current slot-table capacity (always a power of two, at
    /// least 16).
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The number of live entries currently retained.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// `true` if the window retains no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The smallest id not yet evicted. Ids below this have been released.
    #[must_use]
    pub fn oldest(&self) -> u64 {
        self.oldest
    }

    /// The first id past the window's densely populated prefix: every id in
    /// `[oldest(), tail_gap())` is present.
    #[must_use]
    pub fn tail_gap(&self) -> u64 {
        self.tail_gap
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_then_get_round_trips() {
        let mut window = DecoderWindow::new();
        window.add(0, 0, &[1, 2, 3, 4]).unwrap();
        // SAFETY: this entry is `Owned`, so `as_slice` can't touch a raw pointer.
        assert_eq!(unsafe { window.get(0).unwrap().as_slice() }, &[1, 2, 3, 4]);
    }

    #[test]
    fn missing_id_returns_none() {
        let window = DecoderWindow::new();
        assert!(window.get(42).is_none());
    }

    #[test]
    fn resolve_checks_gross_pixels_bound() {
        let mut window = DecoderWindow::new();
        window.add(5, 5, &[1, 2, 3, 4, 5, 6, 7, 8]).unwrap(); // 2 pixels
        assert!(window.resolve(6, 1, 0).is_ok());
        assert!(window.resolve(6, 1, 1).is_ok());
        // gross_pixels(2) >= pixel_offset(2) still passes this coarse
        // existence check; decode_body's per-pixel bounds check is what
        // catches an actual out-of-range read at that offset.
        assert!(window.resolve(6, 1, 2).is_ok());
        assert!(matches!(
            window.resolve(6, 1, 3),
            Err(DecodeError::ReferenceNotFound { .. })
        ));
    }

    #[test]
    fn resolve_missing_target_is_reference_not_found() {
        let window = DecoderWindow::new();
        let err = window.resolve(10, 3, 0).unwrap_err();
        assert!(matches!(err, DecodeError::ReferenceNotFound { .. }));
    }

    #[test]
    fn grows_on_collision_instead_of_displacing() {
        let mut window = DecoderWindow::with_capacity_hint(MIN_CAPACITY);
        let start_capacity = window.capacity();
        // A retention hint at least as large as every id involved keeps
        // new_oldest pinned at 0 throughout, so nothing is evicted while we
        // fill every slot and trigger the grow.
        let whd = start_capacity as u32;
        for id in 0..start_capacity as u64 {
            window.add(id, whd, &[id as u8, 0, 0, 0]).unwrap();
        }
        window.add(start_capacity as u64, whd, &[0xFF, 0, 0, 0]).unwrap();
        assert!(window.capacity() > start_capacity);
        for id in 0..start_capacity as u64 {
            assert!(window.get(id).is_some(), "id {id} should have survived the grow");
        }
    }

    #[test]
    fn retention_lags_one_frame_behind_insertion() {
        // Each frame declares win_head_dist = 1: once a frame becomes the
        // tail of the dense prefix, its own hint frees everything more than
        // one frame behind it.
        let mut window = DecoderWindow::new();
        window.add(0, 1, &[0, 0, 0, 0]).unwrap();
        window.add(1, 1, &[0, 0, 0, 0]).unwrap();
        assert!(window.get(0).is_some(), "id 0 not yet evicted after only id 1 landed");
        window.add(2, 1, &[0, 0, 0, 0]).unwrap();
        assert!(window.get(0).is_none(), "id 0 should be evicted once id 2 makes id 1 the tail");
        assert!(window.get(1).is_some());
        assert!(window.get(2).is_some());
    }

    #[test]
    fn s6_window_eviction_keeps_at_most_two_entries() {
        let mut window = DecoderWindow::new();
        for id in 0..32u64 {
            window.add(id, 1, &[0, 0, 0, 0]).unwrap();
        }
        let live = (0..32u64).filter(|&id| window.get(id).is_some()).count();
        assert!(live <= 2, "expected at most two live entries, found {live}");
        assert!(matches!(
            window.resolve(31, 3, 0),
            Err(DecodeError::ReferenceNotFound { .. })
        ));
    }

    #[test]
    fn clear_resets_capacity_to_minimum() {
        let mut window = DecoderWindow::with_capacity_hint(256);
        window.add(0, 0, &[7, 7, 7, 7]).unwrap();
        window.clear();
        assert!(window.get(0).is_none());
        assert_eq!(window.capacity(), MIN_CAPACITY);
    }

    #[test]
    fn borrowed_entry_reads_back_caller_buffer() {
        let mut window = DecoderWindow::new();
        let buf = vec![9u8, 8, 7, 6];
        // SAFETY: `buf` outlives the `get`/`as_slice` calls below.
        unsafe {
            window.add_borrowed(0, &buf).unwrap();
        }
        // SAFETY: see above — `buf` is still alive and unmutated here.
        assert_eq!(unsafe { window.get(0).unwrap().as_slice() }, &[9, 8, 7, 6]);
    }
}
