//! Raw allocation entry points.
//!
//! [`AllocationOperators`] is the full family of sized allocation and
//! deallocation operations: single and array forms, each throwing (returns
//! an error) or non-throwing (returns `None`). The default methods give
//! the general-purpose semantics, where array forms behave exactly like
//! single-object ones and the non-throwing forms delegate to the throwing
//! ones.

use std::ptr::NonNull;

use crate::api::error::{AllocError, GcResult};

/// Sized allocation and deallocation, throwing and non-throwing.
pub trait AllocationOperators {
    /// Allocate at least `size` bytes, running the out-of-memory handler
    /// loop on failure. Never returns null; zero-sized requests yield a
    /// distinct, valid pointer.
    fn allocate(&self, size: usize) -> Result<NonNull<u8>, AllocError>;

    /// Release memory from [`allocate`](Self::allocate). Null is a no-op.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or a live pointer returned by this operator
    /// family, and must not be used afterwards.
    unsafe fn deallocate(&self, ptr: *mut u8);

    /// Like [`allocate`](Self::allocate), but exhaustion yields `None`.
    fn allocate_nothrow(&self, size: usize) -> Option<NonNull<u8>> {
        self.allocate(size).ok()
    }

    /// Same as [`deallocate`](Self::deallocate).
    ///
    /// # Safety
    ///
    /// See [`deallocate`](Self::deallocate).
    unsafe fn deallocate_nothrow(&self, ptr: *mut u8) {
        self.deallocate(ptr)
    }

    /// Allocate storage for an array of `size` bytes.
    fn allocate_array(&self, size: usize) -> GcResult<NonNull<u8>> {
        Ok(self.allocate(size)?)
    }

    /// Like [`allocate_array`](Self::allocate_array), but exhaustion
    /// yields `Ok(None)`.
    fn allocate_array_nothrow(&self, size: usize) -> GcResult<Option<NonNull<u8>>> {
        Ok(self.allocate_nothrow(size))
    }

    /// Release array storage.
    ///
    /// # Safety
    ///
    /// See [`deallocate`](Self::deallocate).
    unsafe fn deallocate_array(&self, ptr: *mut u8) -> GcResult<()> {
        self.deallocate(ptr);
        Ok(())
    }

    /// Same as [`deallocate_array`](Self::deallocate_array).
    ///
    /// # Safety
    ///
    /// See [`deallocate`](Self::deallocate).
    unsafe fn deallocate_array_nothrow(&self, ptr: *mut u8) -> GcResult<()> {
        self.deallocate_array(ptr)
    }
}
