//! Pointers to collectable objects.
//!
//! [`Gc<T>`] is a plain, copyable pointer. It keeps its target alive only
//! while stored in memory the collector scans: a collectable object or an
//! uncollectable block. The collector does not see the Rust stack or the
//! system heap, so a `Gc` held in a local variable or in a `Vec` buffer is
//! invisible to it. [`Root<T>`] is the owning handle for those places.

use std::fmt;
use std::ops::Deref;
use std::ptr::NonNull;
use std::sync::Arc;

use crate::collector::Collector;

/// Unrooted pointer to a collectable object.
#[repr(transparent)]
pub struct Gc<T> {
    ptr: NonNull<T>,
}

impl<T> Gc<T> {
    /// Wrap a raw object pointer.
    pub const fn from_non_null(ptr: NonNull<T>) -> Self {
        Self { ptr }
    }

    /// Get the raw pointer.
    pub fn as_ptr(self) -> *mut T {
        self.ptr.as_ptr()
    }

    /// Borrow the target.
    ///
    /// # Safety
    ///
    /// The target must still be alive: reachable from a root or from
    /// scanned memory for the whole of `'a`, and not finalized.
    pub unsafe fn as_ref<'a>(self) -> &'a T {
        &*self.ptr.as_ptr()
    }
}

impl<T> Clone for Gc<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Gc<T> {}

impl<T> PartialEq for Gc<T> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr == other.ptr
    }
}

impl<T> Eq for Gc<T> {}

impl<T> fmt::Debug for Gc<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Gc({:p})", self.ptr)
    }
}

// Safety: a Gc only hands out shared references, and only through `unsafe`.
unsafe impl<T: Send + Sync> Send for Gc<T> {}
unsafe impl<T: Send + Sync> Sync for Gc<T> {}

/// Rooted pointer to a collectable object.
///
/// Each `Root` holds one counted root on its target, so the target and
/// everything reachable from it survive collections until the last `Root`
/// is dropped.
pub struct Root<T> {
    ptr: NonNull<T>,
    collector: Arc<dyn Collector>,
}

impl<T> Root<T> {
    /// Take ownership of a root already registered at `ptr`.
    ///
    /// # Safety
    ///
    /// `ptr` must point to a live, initialized object in `collector`'s
    /// collectable region, and one root at exactly `ptr` must be handed over.
    pub(crate) unsafe fn from_registered(ptr: NonNull<T>, collector: Arc<dyn Collector>) -> Self {
        Self { ptr, collector }
    }

    /// Root the target of `gc`.
    ///
    /// # Safety
    ///
    /// `gc` must point to a live, initialized object allocated by `collector`.
    pub unsafe fn from_gc(gc: Gc<T>, collector: Arc<dyn Collector>) -> Self {
        collector.add_root(gc.as_ptr().cast::<u8>());
        Self {
            ptr: gc.ptr,
            collector,
        }
    }

    /// An unrooted copy of this pointer, for storing in scanned memory.
    pub fn as_gc(&self) -> Gc<T> {
        Gc::from_non_null(self.ptr)
    }

    /// Get the raw pointer.
    pub fn as_ptr(&self) -> *mut T {
        self.ptr.as_ptr()
    }

    /// The collector owning the target.
    pub fn collector(&self) -> &Arc<dyn Collector> {
        &self.collector
    }

    /// True if both roots point to the same object.
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        this.ptr == other.ptr
    }

    /// Give up the root without removing it, returning its parts.
    pub(crate) fn into_parts(self) -> (NonNull<T>, Arc<dyn Collector>) {
        let this = std::mem::ManuallyDrop::new(self);
        // SAFETY: `this` is never dropped, so the collector handle is moved
        // out exactly once.
        let collector = unsafe { std::ptr::read(&this.collector) };
        (this.ptr, collector)
    }
}

impl<T> Deref for Root<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        // SAFETY: the root keeps the target reachable, and rooted objects
        // are never finalized.
        unsafe { self.ptr.as_ref() }
    }
}

impl<T> Clone for Root<T> {
    fn clone(&self) -> Self {
        self.collector.add_root(self.ptr.as_ptr().cast::<u8>());
        Self {
            ptr: self.ptr,
            collector: Arc::clone(&self.collector),
        }
    }
}

impl<T> Drop for Root<T> {
    fn drop(&mut self) {
        self.collector.remove_root(self.ptr.as_ptr().cast::<u8>());
    }
}

impl<T: fmt::Debug> fmt::Debug for Root<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Root").field(&**self).finish()
    }
}

// Safety: Root behaves like Arc<T> with respect to thread sharing.
unsafe impl<T: Send + Sync> Send for Root<T> {}
unsafe impl<T: Send + Sync> Sync for Root<T> {}
