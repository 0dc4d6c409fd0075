//! Memory poisoning for debugging.
//!
//! Freed and finalized blocks are filled with a known pattern so that a
//! use-after-free or use-after-finalize reads garbage that is easy to spot.

/// Pattern written over released and finalized blocks.
pub const FREED_PATTERN: u8 = 0xCD;

/// Poison a region of memory with the freed pattern.
///
/// # Safety
///
/// The memory region must be valid and writable.
pub unsafe fn poison_freed(ptr: *mut u8, size: usize) {
    std::ptr::write_bytes(ptr, FREED_PATTERN, size);
}

/// True if every byte of the region carries the freed pattern.
///
/// # Safety
///
/// The memory region must be valid and readable.
pub unsafe fn is_freed_poison(ptr: *const u8, size: usize) -> bool {
    std::slice::from_raw_parts(ptr, size)
        .iter()
        .all(|&byte| byte == FREED_PATTERN)
}
