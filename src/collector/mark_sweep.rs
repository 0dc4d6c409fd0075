//! Conservative mark-and-sweep collector.
//!
//! Every block lives in one table behind a single mutex. A collection marks
//! from the roots (uncollectable blocks, counted explicit roots and blocks
//! awaiting finalization), scanning block contents word by word and
//! treating anything that points into a block, interior pointers included,
//! as a reference. Unreachable blocks with a finalizer are queued and kept
//! for one more cycle; the rest are released.

use std::alloc::{self, Layout};
use std::collections::BTreeMap;
use std::ptr::{self, NonNull};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use super::block::{Block, BlockTable};
use super::finalize::{FinalizationQueue, PendingFinalizer};
use super::{Collector, Finalizer, Region};
use crate::api::config::CollectorConfig;
use crate::api::stats::CollectorStats;
use crate::diagnostics::{emit_with_context, GC201, GC202};
use crate::sync::mutex::Mutex;
use crate::util::layout::{charged_bytes, granule_capacity, GRANULE};

#[cfg(feature = "debug")]
use crate::debug::backtrace::{AllocationTrace, BacktraceTracker};

/// Block table, roots and accounting. Guarded by the collector mutex.
#[derive(Default)]
struct HeapState {
    blocks: BlockTable,
    /// Explicit roots: address -> count.
    roots: BTreeMap<usize, usize>,
    next_id: u64,
    heap_limit: usize,

    collectable_bytes: usize,
    uncollectable_bytes: usize,
    collectable_blocks: usize,
    uncollectable_blocks: usize,
    peak_bytes: usize,
    allocated_since_collect: usize,

    collections: u64,
    reclaimed: u64,
    freed: u64,
    failed_allocations: u64,
}

impl HeapState {
    fn heap_bytes(&self) -> usize {
        self.collectable_bytes + self.uncollectable_bytes
    }

    fn fits(&self, charge: usize) -> bool {
        self.heap_limit == 0
            || self
                .heap_bytes()
                .checked_add(charge)
                .map_or(false, |total| total <= self.heap_limit)
    }

    fn charge(&mut self, region: Region, capacity: usize) {
        let charge = charged_bytes(capacity);
        match region {
            Region::Collectable => {
                self.collectable_bytes += charge;
                self.collectable_blocks += 1;
            }
            Region::Uncollectable => {
                self.uncollectable_bytes += charge;
                self.uncollectable_blocks += 1;
            }
        }
        self.peak_bytes = self.peak_bytes.max(self.heap_bytes());
    }

    fn discharge(&mut self, region: Region, capacity: usize) {
        let charge = charged_bytes(capacity);
        match region {
            Region::Collectable => {
                self.collectable_bytes -= charge;
                self.collectable_blocks -= 1;
            }
            Region::Uncollectable => {
                self.uncollectable_bytes -= charge;
                self.uncollectable_blocks -= 1;
            }
        }
    }

    fn add_root(&mut self, addr: usize) {
        *self.roots.entry(addr).or_insert(0) += 1;
    }

    /// Drop every root pointing into `[base, base + capacity)`.
    fn release_roots_in(&mut self, base: usize, capacity: usize) {
        let doomed: Vec<usize> = self
            .roots
            .range(base..base.saturating_add(capacity))
            .map(|(&addr, _)| addr)
            .collect();
        for addr in doomed {
            self.roots.remove(&addr);
        }
    }

    fn mark_block(&mut self, base: usize, stack: &mut Vec<usize>) {
        if let Some(block) = self.blocks.get_mut(base) {
            if !block.marked {
                block.marked = true;
                stack.push(base);
            }
        }
    }

    /// Scan queued blocks until the mark stack drains.
    fn trace(&mut self, stack: &mut Vec<usize>) {
        while let Some(base) = stack.pop() {
            let words = match self.blocks.get(base) {
                Some(block) => block.scan_words(),
                None => continue,
            };
            let start = base as *const AtomicUsize;
            for index in 0..words {
                // SAFETY: the block is live, granule aligned and `words`
                // whole words long. Mutators may write concurrently, hence
                // the atomic read.
                let word = unsafe { (*start.add(index)).load(Ordering::Relaxed) };
                if let Some(target) = self.blocks.containing(word) {
                    self.mark_block(target, stack);
                }
            }
        }
    }
}

/// The bundled conservative collector.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use gcgate::{Collector, CollectorConfig, MarkSweepCollector};
///
/// let collector: Arc<dyn Collector> = Arc::new(MarkSweepCollector::new(CollectorConfig::minimal()));
/// let block = collector.allocate_collectable(64);
/// assert!(!block.is_null());
/// assert!(collector.is_collectable(block));
///
/// // Release the root the block was born with; nothing else refers to it.
/// collector.remove_root(block);
/// collector.force_collect();
/// assert!(collector.base_of(block).is_none());
/// ```
pub struct MarkSweepCollector {
    config: CollectorConfig,
    state: Mutex<HeapState>,
    finalizers: FinalizationQueue,
    finalized: AtomicU64,
    #[cfg(feature = "debug")]
    tracker: BacktraceTracker,
}

impl MarkSweepCollector {
    /// Create a collector with the given configuration.
    pub fn new(config: CollectorConfig) -> Self {
        let state = HeapState {
            heap_limit: config.heap_limit,
            ..HeapState::default()
        };
        log::debug!(
            "[gcgate] collector created (limit {}, threshold {})",
            crate::util::size::format_limit(config.heap_limit),
            config.collection_threshold
        );
        Self {
            config,
            state: Mutex::new(state),
            finalizers: FinalizationQueue::default(),
            finalized: AtomicU64::new(0),
            #[cfg(feature = "debug")]
            tracker: BacktraceTracker::new(),
        }
    }

    /// Get the configuration.
    pub fn config(&self) -> &CollectorConfig {
        &self.config
    }

    /// Uncollectable blocks allocated but never freed, oldest first.
    #[cfg(feature = "debug")]
    pub fn leak_report(&self) -> Vec<AllocationTrace> {
        self.tracker.active_allocations()
    }

    fn poisoning(&self) -> bool {
        cfg!(feature = "debug") && self.config.debug_mode
    }

    fn allocate_in(&self, size: usize, region: Region) -> *mut u8 {
        let Some(capacity) = granule_capacity(size) else {
            self.state.lock().failed_allocations += 1;
            return ptr::null_mut();
        };
        let charge = charged_bytes(capacity);
        let mut collected = false;
        let mut state = self.state.lock();

        if region == Region::Collectable
            && self.config.collection_threshold != 0
            && state.allocated_since_collect >= self.config.collection_threshold
        {
            self.collect_locked(&mut state);
            collected = true;
        }

        if !state.fits(charge) && self.config.collect_on_pressure && !collected {
            log::debug!("[gcgate] heap pressure on {} byte request, collecting", size);
            self.collect_locked(&mut state);
            collected = true;
        }

        let ptr = if state.fits(charge) {
            allocate_block(capacity)
        } else {
            ptr::null_mut()
        };

        if ptr.is_null() {
            state.failed_allocations += 1;
        } else {
            let base = ptr as usize;
            let id = state.next_id;
            state.next_id += 1;
            state.blocks.insert(base, Block::new(id, capacity, region));
            state.charge(region, capacity);
            if region == Region::Collectable {
                state.add_root(base);
                state.allocated_since_collect += charge;
            }
        }
        drop(state);

        log::trace!("[gcgate] {:?} allocation of {} bytes -> {:p}", region, size, ptr);

        #[cfg(feature = "debug")]
        {
            if !ptr.is_null() && region == Region::Uncollectable && self.config.debug_mode {
                self.tracker.record_alloc(ptr as usize, capacity);
            }
        }

        if collected {
            self.finalize_after_collect();
        }
        ptr
    }

    /// Mark, queue finalizers, sweep. Returns the number of finalizers queued.
    fn collect_locked(&self, state: &mut HeapState) -> usize {
        let mut stack = Vec::new();
        for (base, block) in state.blocks.iter_mut() {
            block.marked = block.is_root();
            if block.marked {
                stack.push(base);
            }
        }
        let rooted: Vec<usize> = state
            .roots
            .keys()
            .filter_map(|&addr| state.blocks.containing(addr))
            .collect();
        for base in rooted {
            state.mark_block(base, &mut stack);
        }
        state.trace(&mut stack);

        // Unreachable blocks with a finalizer survive until it has run,
        // together with everything they reference.
        let mut queued = 0;
        for (base, block) in state.blocks.iter_mut() {
            if block.marked {
                continue;
            }
            if let Some(finalizer) = block.finalizer.take() {
                block.finalization_pending = true;
                block.finalization_seq += 1;
                block.marked = true;
                self.finalizers.push(PendingFinalizer {
                    base,
                    block_id: block.id,
                    sequence: block.finalization_seq,
                    finalizer,
                });
                stack.push(base);
                queued += 1;
            }
        }
        state.trace(&mut stack);

        let poison = self.poisoning();
        let swept = state.blocks.drain_where(|block| !block.marked);
        for (base, block) in &swept {
            state.discharge(block.region, block.capacity);
            state.release_roots_in(*base, block.capacity);
            // SAFETY: the block was just removed from the table and nothing
            // reachable refers to it.
            unsafe { release_block(*base, block.capacity, poison) };
        }

        state.reclaimed += swept.len() as u64;
        state.collections += 1;
        state.allocated_since_collect = 0;

        log::debug!(
            "[gcgate] collection #{}: reclaimed {} blocks, queued {} finalizers, {} blocks live",
            state.collections,
            swept.len(),
            queued,
            state.blocks.len()
        );
        queued
    }

    fn finalize_after_collect(&self) {
        if !self.config.finalize_on_demand {
            self.invoke_finalizers();
        }
    }

    /// Claim a queued finalization; false if it was cancelled or the block
    /// is gone.
    fn begin_finalization(&self, pending: &PendingFinalizer) -> bool {
        let mut state = self.state.lock();
        match state.blocks.get_mut(pending.base) {
            Some(block)
                if block.id == pending.block_id
                    && block.finalization_seq == pending.sequence
                    && block.finalization_pending =>
            {
                block.finalization_pending = false;
                block.finalizing = true;
                true
            }
            _ => false,
        }
    }

    fn end_finalization(&self, pending: &PendingFinalizer) {
        let mut state = self.state.lock();
        if let Some(block) = state.blocks.get_mut(pending.base) {
            if block.id == pending.block_id {
                block.finalizing = false;
                #[cfg(feature = "debug")]
                {
                    if self.config.debug_mode {
                        // SAFETY: the block is live and its object has been dropped.
                        unsafe {
                            crate::debug::poison::poison_freed(pending.base as *mut u8, block.capacity)
                        };
                    }
                }
            }
        }
    }
}

impl Default for MarkSweepCollector {
    fn default() -> Self {
        Self::new(CollectorConfig::default())
    }
}

impl Collector for MarkSweepCollector {
    fn allocate_collectable(&self, size: usize) -> *mut u8 {
        self.allocate_in(size, Region::Collectable)
    }

    fn allocate_uncollectable(&self, size: usize) -> *mut u8 {
        self.allocate_in(size, Region::Uncollectable)
    }

    unsafe fn free(&self, ptr: *mut u8) {
        if ptr.is_null() {
            return;
        }
        let base = ptr as usize;
        let mut state = self.state.lock();
        let Some(block) = state.blocks.remove(base) else {
            drop(state);
            emit_with_context(&GC201, &format!("address {:p}", ptr));
            return;
        };
        state.discharge(block.region, block.capacity);
        state.release_roots_in(base, block.capacity);
        state.freed += 1;
        drop(state);

        #[cfg(feature = "debug")]
        self.tracker.record_free(base);

        log::trace!("[gcgate] freed {:?} block {:p}", block.region, ptr);
        release_block(base, block.capacity, self.poisoning());
    }

    fn base_of(&self, ptr: *const u8) -> Option<NonNull<u8>> {
        let base = self.state.lock().blocks.containing(ptr as usize)?;
        NonNull::new(base as *mut u8)
    }

    fn region_of(&self, ptr: *const u8) -> Option<Region> {
        let state = self.state.lock();
        let base = state.blocks.containing(ptr as usize)?;
        state.blocks.get(base).map(|block| block.region)
    }

    fn register_finalizer(&self, base: NonNull<u8>, finalizer: Option<Finalizer>) -> Option<Finalizer> {
        let mut state = self.state.lock();
        let rejection = match state.blocks.get_mut(base.as_ptr() as usize) {
            Some(block) if finalizer.is_none() || block.region == Region::Collectable => {
                // Any change of registration withdraws a queued, not yet started run.
                block.finalization_pending = false;
                block.finalization_seq += 1;
                return std::mem::replace(&mut block.finalizer, finalizer);
            }
            Some(_) => "is uncollectable",
            None => "is not a block base",
        };
        drop(state);

        if finalizer.is_some() {
            emit_with_context(&GC202, &format!("{:p} {}", base, rejection));
        }
        None
    }

    fn add_root(&self, ptr: *const u8) {
        if ptr.is_null() {
            return;
        }
        self.state.lock().add_root(ptr as usize);
    }

    fn remove_root(&self, ptr: *const u8) {
        let addr = ptr as usize;
        let mut state = self.state.lock();
        match state.roots.get_mut(&addr) {
            Some(count) if *count > 1 => *count -= 1,
            Some(_) => {
                state.roots.remove(&addr);
            }
            None => log::warn!("[gcgate] remove_root({:p}) without a matching root", ptr),
        }
    }

    fn force_collect(&self) {
        {
            let mut state = self.state.lock();
            self.collect_locked(&mut state);
        }
        self.finalize_after_collect();
    }

    /// Runs queued finalizers on the calling thread.
    ///
    /// A finalizer that panics propagates; its block stays alive (and
    /// leaked) since it is never marked as finalized.
    fn invoke_finalizers(&self) -> usize {
        let mut ran = 0;
        while let Some(pending) = self.finalizers.pop() {
            if !self.begin_finalization(&pending) {
                continue;
            }
            let Some(base) = NonNull::new(pending.base as *mut u8) else {
                continue;
            };
            // SAFETY: the block is live and flagged as finalizing, so it is
            // neither reclaimed nor finalized again while the callback runs.
            unsafe { (pending.finalizer.callback)(base, pending.finalizer.offset) };
            self.end_finalization(&pending);
            self.finalized.fetch_add(1, Ordering::Relaxed);
            ran += 1;
        }
        if ran > 0 {
            log::debug!("[gcgate] ran {} finalizers", ran);
        }
        ran
    }

    fn set_heap_limit(&self, bytes: usize) {
        self.state.lock().heap_limit = bytes;
    }

    fn heap_limit(&self) -> usize {
        self.state.lock().heap_limit
    }

    fn stats(&self) -> CollectorStats {
        let state = self.state.lock();
        let (registered_finalizers, pending_finalizers) =
            state.blocks.iter().fold((0, 0), |(registered, pending), (_, block)| {
                (
                    registered + block.finalizer.is_some() as usize,
                    pending + block.finalization_pending as usize,
                )
            });
        CollectorStats {
            collectable_bytes: state.collectable_bytes,
            uncollectable_bytes: state.uncollectable_bytes,
            collectable_blocks: state.collectable_blocks,
            uncollectable_blocks: state.uncollectable_blocks,
            peak_bytes: state.peak_bytes,
            heap_limit: state.heap_limit,
            collections: state.collections,
            finalized: self.finalized.load(Ordering::Relaxed),
            reclaimed: state.reclaimed,
            freed: state.freed,
            registered_finalizers,
            pending_finalizers,
            roots: state.roots.values().sum(),
            failed_allocations: state.failed_allocations,
        }
    }
}

impl Drop for MarkSweepCollector {
    fn drop(&mut self) {
        #[cfg(feature = "debug")]
        {
            if self.config.debug_mode {
                self.tracker.log_leak_report();
            }
        }

        let poison = self.poisoning();
        let state = self.state.get_mut();
        for (base, block) in state.blocks.drain_where(|_| true) {
            // SAFETY: the collector is going away; no block outlives it.
            unsafe { release_block(base, block.capacity, poison) };
        }
    }
}

fn allocate_block(capacity: usize) -> *mut u8 {
    match Layout::from_size_align(capacity, GRANULE) {
        // SAFETY: capacity is never zero.
        Ok(layout) => unsafe { alloc::alloc_zeroed(layout) },
        Err(_) => ptr::null_mut(),
    }
}

/// # Safety
///
/// `base` must come from `allocate_block(capacity)` and not be used again.
unsafe fn release_block(base: usize, capacity: usize, poison: bool) {
    #[cfg(feature = "debug")]
    {
        if poison {
            crate::debug::poison::poison_freed(base as *mut u8, capacity);
        }
    }
    #[cfg(not(feature = "debug"))]
    let _ = poison;

    alloc::dealloc(base as *mut u8, Layout::from_size_align_unchecked(capacity, GRANULE));
}
