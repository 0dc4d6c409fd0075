//! Opting objects into collector-managed lifetime.
//!
//! A collectable type embeds a [`CollectableBase`] and implements
//! [`Collectable`]. Once such an object sits in the collector's
//! collectable region, [`attach`] registers a finalizer keyed on the block
//! base and the object's offset within the block; when the collector
//! proves the block unreachable the finalizer rebuilds the object pointer
//! and drops it in place.
//!
//! Objects living anywhere else (on the stack, inside an uncollectable
//! block, inside a `Box`) are never registered and are dropped by the
//! usual ownership rules.

use std::fmt;
use std::ptr::NonNull;
use std::sync::{Arc, OnceLock, Weak};

use crate::api::error::{AllocError, GcError, GcResult};
use crate::api::handler::allocate_with_retry;
use crate::api::operators::AllocationOperators;
use crate::collector::{Collector, Finalizer, FinalizerFn, Region};
use crate::diagnostics::{emit, GC001, GC002};

/// A type whose heap instances are reclaimed by the collector.
///
/// # Example
///
/// ```rust
/// use gcgate::{AllocationGateway, Collectable, CollectableBase, CollectorConfig};
///
/// struct Node {
///     base: CollectableBase,
///     value: u32,
/// }
///
/// impl Collectable for Node {
///     fn collectable_base(&self) -> &CollectableBase {
///         &self.base
///     }
/// }
///
/// let gateway = AllocationGateway::with_config(CollectorConfig::minimal());
/// let node = gateway.new_collectable(Node { base: CollectableBase::new(), value: 7 }).unwrap();
/// assert_eq!(node.value, 7);
/// assert!(node.collectable_base().is_registered());
/// ```
pub trait Collectable: Send + 'static {
    /// The embedded registration state.
    fn collectable_base(&self) -> &CollectableBase;
}

struct Registration {
    collector: Weak<dyn Collector>,
    base: usize,
}

/// Finalizer registration state embedded in every collectable object.
///
/// Registers at most once. Cloning yields an unregistered base, so a copy
/// placed in collectable memory registers on its own. Dropping deregisters,
/// which is a no-op if nothing was registered.
pub struct CollectableBase {
    registration: OnceLock<Registration>,
}

impl CollectableBase {
    /// Create an unregistered base.
    pub const fn new() -> Self {
        Self {
            registration: OnceLock::new(),
        }
    }

    /// True once a finalizer has been registered for the owning object.
    pub fn is_registered(&self) -> bool {
        self.registration.get().is_some()
    }

    /// Register `callback` for the object at `object`.
    ///
    /// Returns false, registering nothing, if this base is already
    /// registered or `object` is not inside `collector`'s collectable
    /// region.
    pub fn initialize(
        &self,
        collector: &Arc<dyn Collector>,
        object: NonNull<u8>,
        callback: FinalizerFn,
    ) -> bool {
        if self.is_registered() {
            return false;
        }
        if collector.region_of(object.as_ptr()) != Some(Region::Collectable) {
            return false;
        }
        let Some(base) = collector.base_of(object.as_ptr()) else {
            return false;
        };
        let Some(offset) = (object.as_ptr() as usize).checked_sub(base.as_ptr() as usize) else {
            return false;
        };

        let registration = Registration {
            collector: Arc::downgrade(collector),
            base: base.as_ptr() as usize,
        };
        if self.registration.set(registration).is_err() {
            return false;
        }
        collector.register_finalizer(base, Some(Finalizer::new(callback, offset)));
        log::trace!("[gcgate] finalizer registered for {:p} (+{})", base, offset);
        true
    }
}

impl Default for CollectableBase {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for CollectableBase {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl fmt::Debug for CollectableBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectableBase")
            .field("registered", &self.is_registered())
            .finish()
    }
}

impl Drop for CollectableBase {
    fn drop(&mut self) {
        let Some(registration) = self.registration.get() else {
            return;
        };
        let Some(collector) = registration.collector.upgrade() else {
            return;
        };
        if let Some(base) = NonNull::new(registration.base as *mut u8) {
            collector.register_finalizer(base, None);
        }
    }
}

/// Register the finalizer for `obj`, if it lives in collectable memory.
pub fn attach<T: Collectable>(obj: &T, collector: &Arc<dyn Collector>) -> bool {
    obj.collectable_base()
        .initialize(collector, NonNull::from(obj).cast(), finalize_object::<T>)
}

/// Finalizer callback for objects of type `T`.
///
/// # Safety
///
/// `base + offset` must address a live, initialized `T` that is never used
/// again.
pub unsafe fn finalize_object<T>(base: NonNull<u8>, offset: usize) {
    if (base.as_ptr() as usize).checked_add(offset).is_none() {
        return;
    }
    let object = base.as_ptr().add(offset).cast::<T>();
    std::ptr::drop_in_place(object);
}

/// Allocation operators for collectable types.
///
/// Single-object forms allocate from the collectable region with the same
/// handler loop as the gateway. Array forms always fail: one finalizer
/// cannot finalize each element of an array.
#[derive(Clone)]
pub struct CollectableOperators {
    collector: Arc<dyn Collector>,
}

impl CollectableOperators {
    /// Operators over `collector`'s collectable region.
    pub fn new(collector: Arc<dyn Collector>) -> Self {
        Self { collector }
    }

    /// The underlying collector.
    pub fn collector(&self) -> &Arc<dyn Collector> {
        &self.collector
    }
}

impl AllocationOperators for CollectableOperators {
    fn allocate(&self, size: usize) -> Result<NonNull<u8>, AllocError> {
        allocate_with_retry(size, |size| self.collector.allocate_collectable(size))
    }

    unsafe fn deallocate(&self, ptr: *mut u8) {
        self.collector.free(ptr);
    }

    fn allocate_array(&self, size: usize) -> GcResult<NonNull<u8>> {
        emit(&GC001);
        log::warn!("[gcgate] rejected {} byte array allocation of a collectable type", size);
        Err(GcError::ArrayNewNotSupported)
    }

    fn allocate_array_nothrow(&self, size: usize) -> GcResult<Option<NonNull<u8>>> {
        self.allocate_array(size).map(Some)
    }

    unsafe fn deallocate_array(&self, ptr: *mut u8) -> GcResult<()> {
        emit(&GC002);
        log::warn!("[gcgate] rejected array deallocation of {:p}", ptr);
        Err(GcError::ArrayDeleteNotSupported)
    }

    unsafe fn deallocate_array_nothrow(&self, ptr: *mut u8) -> GcResult<()> {
        self.deallocate_array(ptr)
    }
}
