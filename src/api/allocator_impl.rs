//! Implementation of the std::alloc::Allocator trait over the gateway.
//!
//! This module requires the `nightly` feature and a nightly Rust compiler.
//! It lets standard collections keep their buffers in scanned,
//! uncollectable memory, so `Gc` pointers stored in them are seen by the
//! collector.
//!
//! Enable with:
//! ```toml
//! [dependencies]
//! gcgate = { version = "0.1", features = ["nightly"] }
//! ```

use std::alloc::{AllocError, Allocator, Layout};
use std::ptr::NonNull;

use crate::api::gateway::AllocationGateway;
use crate::api::operators::AllocationOperators;
use crate::util::layout::{align_up, GRANULE};

/// Allocator handing out uncollectable gateway memory.
#[derive(Clone)]
pub struct UncollectableAllocator {
    gateway: AllocationGateway,
}

impl UncollectableAllocator {
    /// Create an allocator over `gateway`.
    pub fn new(gateway: AllocationGateway) -> Self {
        Self { gateway }
    }
}

unsafe impl Allocator for UncollectableAllocator {
    fn allocate(&self, layout: Layout) -> Result<NonNull<[u8]>, AllocError> {
        let padding = layout.align().saturating_sub(GRANULE);
        let size = layout.size().checked_add(padding).ok_or(AllocError)?;
        let base = self.gateway.allocate(size).map_err(|_| AllocError)?;

        let addr = base.as_ptr() as usize;
        let aligned = align_up(addr, layout.align()).ok_or(AllocError)?;
        // SAFETY: `aligned - addr <= padding`, inside the block.
        let ptr = unsafe { NonNull::new_unchecked(base.as_ptr().add(aligned - addr)) };
        Ok(NonNull::slice_from_raw_parts(ptr, layout.size()))
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, _layout: Layout) {
        if let Some(base) = self.gateway.collector().base_of(ptr.as_ptr()) {
            self.gateway.deallocate(base.as_ptr());
        }
    }
}
