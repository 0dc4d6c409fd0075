//! The collector capability.
//!
//! Everything above this module treats the collector as an opaque service:
//! it hands out collectable and uncollectable memory, maps interior
//! pointers back to block bases, keeps one finalizer registration per
//! block and reclaims unreachable collectable blocks. [`MarkSweepCollector`]
//! is the bundled conservative implementation; other collectors plug in by
//! implementing [`Collector`].

mod block;
mod finalize;
mod mark_sweep;

pub use mark_sweep::MarkSweepCollector;

use std::fmt;
use std::ptr::NonNull;

use crate::api::stats::CollectorStats;

/// Finalization callback.
///
/// Receives the base address of the unreachable block and the offset, stored
/// at registration time, of the object to finalize within that block.
///
/// # Safety
///
/// Implementations may assume `base` is the start of a live block of the
/// collector that registered them and that `offset` is the value they were
/// registered with.
pub type FinalizerFn = unsafe fn(base: NonNull<u8>, offset: usize);

/// A finalizer registration: callback plus object offset within the block.
///
/// Self-references (pointers from the block into itself) never keep a
/// registered block alive.
#[derive(Clone, Copy)]
pub struct Finalizer {
    /// Function invoked once the block is proven unreachable.
    pub callback: FinalizerFn,
    /// Distance from the block base to the object being finalized.
    pub offset: usize,
}

impl Finalizer {
    /// Create a registration for an object `offset` bytes into its block.
    pub const fn new(callback: FinalizerFn, offset: usize) -> Self {
        Self { callback, offset }
    }
}

impl fmt::Debug for Finalizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Finalizer")
            .field("callback", &(self.callback as usize as *const ()))
            .field("offset", &self.offset)
            .finish()
    }
}

/// Which part of the collector heap a block lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Region {
    /// Reclaimed automatically once unreachable.
    Collectable,
    /// Scanned for pointers but only ever released explicitly.
    Uncollectable,
}

/// Services a garbage collector provides to the allocation gateway.
///
/// Implementations must be safe to call from any thread. Finalizers must be
/// invoked without holding any lock the other methods take, since a
/// finalizer typically deregisters itself and may allocate.
pub trait Collector: Send + Sync {
    /// Allocate zeroed, collectable memory; null when exhausted.
    ///
    /// The block starts out holding one root on behalf of the caller, the
    /// analogue of the fresh pointer sitting in a scanned register. Release
    /// it with [`Collector::remove_root`] once the pointer is stored in
    /// scanned memory (or let a `Root` own it).
    fn allocate_collectable(&self, size: usize) -> *mut u8;

    /// Allocate zeroed, uncollectable memory; null when exhausted.
    fn allocate_uncollectable(&self, size: usize) -> *mut u8;

    /// Release a block. Null is a no-op.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or a block base returned by this collector that
    /// has not been freed or reclaimed, and must not be used afterwards.
    unsafe fn free(&self, ptr: *mut u8);

    /// Base of the block containing `ptr`, or `None` for foreign memory.
    fn base_of(&self, ptr: *const u8) -> Option<NonNull<u8>>;

    /// Region of the block containing `ptr`, or `None` for foreign memory.
    fn region_of(&self, ptr: *const u8) -> Option<Region>;

    /// True if `ptr` points into the collectable region.
    fn is_collectable(&self, ptr: *const u8) -> bool {
        self.region_of(ptr) == Some(Region::Collectable)
    }

    /// Install (`Some`) or cancel (`None`) the finalizer for the block at
    /// `base`, returning the previous registration.
    ///
    /// Cancelling also withdraws a finalization that is queued but has not
    /// run yet.
    fn register_finalizer(&self, base: NonNull<u8>, finalizer: Option<Finalizer>) -> Option<Finalizer>;

    /// Add one root at `ptr`; the containing block stays reachable.
    fn add_root(&self, ptr: *const u8);

    /// Drop one root previously added at `ptr`.
    fn remove_root(&self, ptr: *const u8);

    /// Run a full collection now.
    fn force_collect(&self);

    /// Run queued finalizers; returns how many ran.
    fn invoke_finalizers(&self) -> usize;

    /// Cap the heap at `bytes` (0 = unlimited).
    fn set_heap_limit(&self, bytes: usize);

    /// Current heap cap (0 = unlimited).
    fn heap_limit(&self) -> usize;

    /// Snapshot of collector statistics.
    fn stats(&self) -> CollectorStats;
}
