//! Owning wrapper for objects in uncollectable memory.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::ptr::NonNull;
use std::sync::Arc;

use crate::collector::Collector;

/// A value allocated in the collector's uncollectable region.
///
/// The block is scanned by the collector, so `Gc` pointers stored in the
/// value keep their targets alive. Dropping the box drops the value and
/// frees the block.
pub struct UncollectableBox<T> {
    ptr: NonNull<T>,
    base: NonNull<u8>,
    collector: Arc<dyn Collector>,
}

impl<T> UncollectableBox<T> {
    /// Take ownership of an initialized value.
    ///
    /// # Safety
    ///
    /// `ptr` must point to an initialized `T` inside the uncollectable
    /// block at `base`, allocated by `collector` and owned by nobody else.
    pub(crate) unsafe fn from_raw(ptr: NonNull<T>, base: NonNull<u8>, collector: Arc<dyn Collector>) -> Self {
        Self {
            ptr,
            base,
            collector,
        }
    }

    /// Get the raw pointer.
    pub fn as_ptr(&self) -> *const T {
        self.ptr.as_ptr()
    }

    /// Get the raw mutable pointer.
    pub fn as_mut_ptr(&mut self) -> *mut T {
        self.ptr.as_ptr()
    }

    /// Base of the block holding the value.
    pub fn block(&self) -> NonNull<u8> {
        self.base
    }
}

impl<T> Deref for UncollectableBox<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        unsafe { self.ptr.as_ref() }
    }
}

impl<T> DerefMut for UncollectableBox<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        unsafe { self.ptr.as_mut() }
    }
}

impl<T: fmt::Debug> fmt::Debug for UncollectableBox<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("UncollectableBox").field(&**self).finish()
    }
}

impl<T> Drop for UncollectableBox<T> {
    fn drop(&mut self) {
        unsafe {
            std::ptr::drop_in_place(self.ptr.as_ptr());
            self.collector.free(self.base.as_ptr());
        }
    }
}

// Safety: UncollectableBox owns its value like Box does
unsafe impl<T: Send> Send for UncollectableBox<T> {}
unsafe impl<T: Sync> Sync for UncollectableBox<T> {}
