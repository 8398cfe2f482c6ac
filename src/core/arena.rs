//! Growable byte arena.
//!
//! The allocation substrate for command records: append-only, bulk clear, no
//! individual free. Offsets handed out by [`Arena::push_bytes`] stay valid until
//! the next [`Arena::clear`]; the backing allocation may move on growth, so
//! callers keep offsets, never references.

use bytemuck::{AnyBitPattern, NoUninit};

/// Records are padded to this alignment so POD headers can be read back
/// with a plain copy.
pub const RECORD_ALIGN: usize = 8;

#[derive(Debug, Default, Clone)]
pub struct Arena {
    data: Vec<u8>,
}

impl Arena {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_capacity(bytes: usize) -> Self {
        Self {
            data: Vec::with_capacity(bytes),
        }
    }

    /// Current write cursor (number of bytes in use).
    #[inline]
    #[must_use]
    pub fn cursor(&self) -> usize {
        self.data.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.data.capacity()
    }

    /// Appends raw bytes and returns the offset they start at.
    pub fn push_bytes(&mut self, bytes: &[u8]) -> usize {
        let offset = self.data.len();
        let before = self.data.capacity();
        self.data.extend_from_slice(bytes);
        if self.data.capacity() != before {
            log::trace!("Arena grew: {} -> {} bytes", before, self.data.capacity());
        }
        offset
    }

    /// Appends a POD value.
    pub fn push_pod<T: NoUninit>(&mut self, value: &T) -> usize {
        self.push_bytes(bytemuck::bytes_of(value))
    }

    /// Reserves zeroed space for a `T` to be filled in later with [`Arena::write_pod_at`].
    pub fn reserve_pod<T: NoUninit>(&mut self) -> usize {
        let offset = self.data.len();
        self.data.resize(offset + size_of::<T>(), 0);
        offset
    }

    /// Overwrites a previously reserved POD slot.
    ///
    /// # Panics
    /// If the slot lies outside the written region.
    pub fn write_pod_at<T: NoUninit>(&mut self, offset: usize, value: &T) {
        let bytes = bytemuck::bytes_of(value);
        self.data[offset..offset + bytes.len()].copy_from_slice(bytes);
    }

    /// Appends `len` zero bytes and returns the offset they start at.
    pub fn push_zeroed(&mut self, len: usize) -> usize {
        let offset = self.data.len();
        let before = self.data.capacity();
        self.data.resize(offset + len, 0);
        if self.data.capacity() != before {
            log::trace!("Arena grew: {} -> {} bytes", before, self.data.capacity());
        }
        offset
    }

    /// Mutable view of an already written region.
    ///
    /// # Panics
    /// If the region lies outside the written bytes.
    pub fn bytes_mut(&mut self, offset: usize, len: usize) -> &mut [u8] {
        &mut self.data[offset..offset + len]
    }

    /// Pads the cursor up to [`RECORD_ALIGN`].
    pub fn align(&mut self) {
        let padded = self.data.len().next_multiple_of(RECORD_ALIGN);
        self.data.resize(padded, 0);
    }

    #[must_use]
    pub fn bytes(&self, offset: usize, len: usize) -> Option<&[u8]> {
        let end = offset.checked_add(len)?;
        self.data.get(offset..end)
    }

    /// Copies a POD value out of the arena. Unaligned reads are fine.
    #[must_use]
    pub fn read_pod<T: AnyBitPattern>(&self, offset: usize) -> Option<T> {
        self.bytes(offset, size_of::<T>())
            .map(bytemuck::pod_read_unaligned)
    }

    /// Resets the cursor to zero, keeping the allocation for reuse.
    pub fn clear(&mut self) {
        self.data.clear();
    }
}
