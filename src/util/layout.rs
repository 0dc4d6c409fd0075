//! Granule arithmetic for collector blocks.

/// Allocation granule: every block is aligned to, and sized in multiples of, this.
pub const GRANULE: usize = 16;

/// Align a size up to the given power-of-two alignment.
///
/// Returns `None` on overflow.
#[inline]
pub const fn align_up(size: usize, align: usize) -> Option<usize> {
    match size.checked_add(align - 1) {
        Some(padded) => Some(padded & !(align - 1)),
        None => None,
    }
}

/// Payload capacity of a block serving a request of `size` bytes.
///
/// Zero-sized requests still occupy one granule so that every live block
/// has a distinct address.
#[inline]
pub const fn granule_capacity(size: usize) -> Option<usize> {
    if size == 0 {
        return Some(GRANULE);
    }
    align_up(size, GRANULE)
}

/// Bytes charged against the heap limit for a block of the given capacity.
///
/// One extra granule accounts for the block's bookkeeping.
#[inline]
pub const fn charged_bytes(capacity: usize) -> usize {
    capacity.saturating_add(GRANULE)
}
