//! The allocation gateway.
//!
//! General-purpose allocation goes to the collector's uncollectable region:
//! the memory is scanned, so it may hold the only pointer to a collectable
//! object, but it is never reclaimed automatically. Collectable objects go
//! through [`CollectableOperators`] and get a finalizer registered.
//!
//! Rust cannot replace the global allocation operators implicitly, so the
//! gateway is passed explicitly (or reached through
//! [`AllocationGateway::global`]). Pointers to collectable objects are only
//! seen by the collector when stored in memory obtained here; memory from
//! the system allocator is not scanned.

use std::alloc::Layout;
use std::ptr::NonNull;
use std::sync::Arc;

use crate::api::collectable::{attach, Collectable, CollectableOperators};
use crate::api::config::CollectorConfig;
use crate::api::error::{AllocError, GcResult};
use crate::api::handler::allocate_with_retry;
use crate::api::operators::AllocationOperators;
use crate::api::pointers::Root;
use crate::api::stats::CollectorStats;
use crate::api::wrappers::UncollectableBox;
use crate::collector::{Collector, MarkSweepCollector};
use crate::util::layout::{align_up, GRANULE};

/// Allocation entry point over a collector.
///
/// # Example
///
/// ```rust
/// use gcgate::{AllocationGateway, AllocationOperators, CollectorConfig};
///
/// let gateway = AllocationGateway::with_config(CollectorConfig::minimal());
///
/// let raw = gateway.allocate(0).unwrap();
/// unsafe { gateway.deallocate(raw.as_ptr()) };
///
/// let boxed = gateway.new_object([1u64, 2, 3]).unwrap();
/// assert_eq!(boxed[2], 3);
/// ```
#[derive(Clone)]
pub struct AllocationGateway {
    collector: Arc<dyn Collector>,
    collectable: CollectableOperators,
}

impl AllocationGateway {
    /// Create a gateway over `collector`.
    pub fn new(collector: Arc<dyn Collector>) -> Self {
        Self {
            collectable: CollectableOperators::new(Arc::clone(&collector)),
            collector,
        }
    }

    /// Create a gateway over a fresh [`MarkSweepCollector`].
    pub fn with_config(config: CollectorConfig) -> Self {
        Self::new(Arc::new(MarkSweepCollector::new(config)))
    }

    /// The process-wide gateway, created on first use from the environment.
    pub fn global() -> GcResult<&'static AllocationGateway> {
        crate::core::global::gateway()
    }

    /// The underlying collector.
    pub fn collector(&self) -> &Arc<dyn Collector> {
        &self.collector
    }

    /// Operators for collectable objects.
    pub fn collectable(&self) -> &CollectableOperators {
        &self.collectable
    }

    /// Move `value` into uncollectable memory.
    pub fn new_object<T>(&self, value: T) -> GcResult<UncollectableBox<T>> {
        let (base, ptr) = reserve::<T, _>(self)?;
        // SAFETY: `reserve` returned aligned, unused space for a T.
        unsafe {
            ptr.as_ptr().write(value);
            Ok(UncollectableBox::from_raw(ptr, base, Arc::clone(&self.collector)))
        }
    }

    /// Like [`new_object`](Self::new_object), but exhaustion yields `None`.
    pub fn new_object_nothrow<T>(&self, value: T) -> Option<UncollectableBox<T>> {
        self.new_object(value).ok()
    }

    /// Move `value` into collectable memory and register its finalizer.
    pub fn new_collectable<T: Collectable>(&self, value: T) -> GcResult<Root<T>> {
        self.new_collectable_with(move || value)
    }

    /// Allocate collectable memory, then build the object in it with `init`.
    ///
    /// `init` only runs once memory has been secured, so a failed
    /// allocation never constructs the object.
    pub fn new_collectable_with<T: Collectable>(&self, init: impl FnOnce() -> T) -> GcResult<Root<T>> {
        let (base, ptr) = reserve::<T, _>(&self.collectable)?;
        let pending = PendingBlock {
            collector: &*self.collector,
            base,
        };
        let value = init();
        std::mem::forget(pending);

        // SAFETY: aligned, unused space for a T inside the block at `base`.
        unsafe { ptr.as_ptr().write(value) };

        // The block was born with a root at its base; move it to the object.
        let object = ptr.as_ptr().cast::<u8>();
        if object != base.as_ptr() {
            self.collector.add_root(object);
            self.collector.remove_root(base.as_ptr());
        }

        // SAFETY: initialized just above.
        let registered = attach(unsafe { ptr.as_ref() }, &self.collector);
        debug_assert!(registered, "fresh collectable object failed to register");

        // SAFETY: the root at `object` is handed to the Root.
        Ok(unsafe { Root::from_registered(ptr, Arc::clone(&self.collector)) })
    }

    /// Like [`new_collectable`](Self::new_collectable), but exhaustion yields `None`.
    pub fn new_collectable_nothrow<T: Collectable>(&self, value: T) -> Option<Root<T>> {
        self.new_collectable(value).ok()
    }

    /// Destroy a collectable object immediately.
    ///
    /// The finalizer registration is cancelled first, so the collector can
    /// no longer finalize the object; then the object is dropped and its
    /// block released.
    ///
    /// # Safety
    ///
    /// `root` must be the only remaining handle to the object: no other
    /// `Root`, and no `Gc` that will be dereferenced again.
    pub unsafe fn delete_collectable<T: Collectable>(&self, root: Root<T>) {
        let (ptr, collector) = root.into_parts();
        let object = ptr.as_ptr().cast::<u8>();
        let Some(base) = collector.base_of(object) else {
            log::warn!("[gcgate] delete_collectable on foreign object {:p}", object);
            return;
        };

        collector.register_finalizer(base, None);
        std::ptr::drop_in_place(ptr.as_ptr());
        CollectableOperators::new(collector).deallocate(base.as_ptr());
    }

    /// Run a full collection now.
    pub fn force_collect(&self) {
        self.collector.force_collect();
    }

    /// Snapshot of collector statistics.
    pub fn stats(&self) -> CollectorStats {
        self.collector.stats()
    }
}

impl AllocationOperators for AllocationGateway {
    fn allocate(&self, size: usize) -> Result<NonNull<u8>, AllocError> {
        allocate_with_retry(size, |size| self.collector.allocate_uncollectable(size))
    }

    unsafe fn deallocate(&self, ptr: *mut u8) {
        self.collector.free(ptr);
    }
}

impl std::fmt::Debug for AllocationGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AllocationGateway")
            .field("stats", &self.collector.stats())
            .finish()
    }
}

/// Releases a reserved block if object construction unwinds.
struct PendingBlock<'a> {
    collector: &'a dyn Collector,
    base: NonNull<u8>,
}

impl Drop for PendingBlock<'_> {
    fn drop(&mut self) {
        unsafe { self.collector.free(self.base.as_ptr()) };
    }
}

/// Reserve space for a `T`: the block base and the aligned object address.
///
/// Blocks are granule aligned; stricter alignments over-allocate and place
/// the object at an offset inside the block.
fn reserve<T, O>(ops: &O) -> Result<(NonNull<u8>, NonNull<T>), AllocError>
where
    O: AllocationOperators + ?Sized,
{
    let layout = Layout::new::<T>();
    let padding = layout.align().saturating_sub(GRANULE);
    let size = layout
        .size()
        .checked_add(padding)
        .ok_or(AllocError::new(layout.size()))?;
    let base = ops.allocate(size)?;

    let addr = base.as_ptr() as usize;
    let Some(aligned) = align_up(addr, layout.align()) else {
        // SAFETY: `base` came from `ops` and is unused.
        unsafe { ops.deallocate(base.as_ptr()) };
        return Err(AllocError::new(size));
    };
    // SAFETY: `aligned - addr <= padding`, so the object stays in the block.
    let object = unsafe { base.as_ptr().add(aligned - addr) };
    match NonNull::new(object.cast::<T>()) {
        Some(object) => Ok((base, object)),
        None => Err(AllocError::new(size)),
    }
}
