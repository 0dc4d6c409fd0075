//! Integration tests for gcgate.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;

use gcgate::{
    attach, mb, set_diagnostic_sink, AllocError, AllocationGateway, AllocationOperators,
    CollectingSink, Collectable, CollectableBase, Collector, CollectorConfig, GcError, Gc,
    HeapLimitGuard, NewHandlerGuard, UncollectableBox,
};

/// The handler slot and diagnostic sink are process-wide.
static HANDLER_LOCK: Mutex<()> = Mutex::new(());

fn serial() -> MutexGuard<'static, ()> {
    HANDLER_LOCK.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Heap limits used by the exhaustion tests; the last step is unlimited.
const HEAP_LADDER: [usize; 5] = [mb(1), mb(3), mb(9), mb(27), 0];

/// An object exactly as large as the first heap step.
const FIRST_OBJECT: usize = HEAP_LADDER[0];

/// Tracks the position on the heap ladder.
struct Heap {
    collector: Arc<dyn Collector>,
    index: AtomicUsize,
}

impl Heap {
    fn new(collector: &Arc<dyn Collector>) -> Arc<Self> {
        Arc::new(Self {
            collector: Arc::clone(collector),
            index: AtomicUsize::new(0),
        })
    }

    fn index(&self) -> usize {
        self.index.load(Ordering::SeqCst)
    }

    fn advance(&self) {
        let next = (self.index.fetch_add(1, Ordering::SeqCst) + 1).min(HEAP_LADDER.len() - 1);
        self.collector.set_heap_limit(HEAP_LADDER[next]);
    }
}

fn gateway() -> AllocationGateway {
    AllocationGateway::with_config(CollectorConfig::minimal())
}

/// Handler that gives up immediately, counting its invocations.
fn throwing_handler(seen: &Arc<AtomicUsize>) -> NewHandlerGuard {
    let seen = Arc::clone(seen);
    NewHandlerGuard::new(Arc::new(move || {
        seen.fetch_add(1, Ordering::SeqCst);
        Err(AllocError::new(0))
    }))
}

/// Handler that climbs one step up the heap ladder per invocation.
fn growing_handler(seen: &Arc<AtomicUsize>, heap: &Arc<Heap>) -> NewHandlerGuard {
    let seen = Arc::clone(seen);
    let heap = Arc::clone(heap);
    NewHandlerGuard::new(Arc::new(move || {
        seen.fetch_add(1, Ordering::SeqCst);
        heap.advance();
        Ok(())
    }))
}

#[derive(Clone)]
struct MyCollectable {
    base: CollectableBase,
    finalized: Arc<AtomicUsize>,
}

impl MyCollectable {
    fn new(finalized: &Arc<AtomicUsize>) -> Self {
        Self {
            base: CollectableBase::new(),
            finalized: Arc::clone(finalized),
        }
    }
}

impl Collectable for MyCollectable {
    fn collectable_base(&self) -> &CollectableBase {
        &self.base
    }
}

impl Drop for MyCollectable {
    fn drop(&mut self) {
        self.finalized.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn test_global_memory_exhaustion() {
    let _serial = serial();
    let _no_handler = NewHandlerGuard::cleared();
    let gateway = gateway();
    let _reduced = HeapLimitGuard::new(&**gateway.collector(), HEAP_LADDER[0]);

    assert_eq!(gateway.allocate(FIRST_OBJECT), Err(AllocError::new(FIRST_OBJECT)));
    assert!(gateway.allocate_nothrow(FIRST_OBJECT).is_none());

    let array = gateway.allocate_array(3 * FIRST_OBJECT);
    assert!(matches!(array, Err(GcError::OutOfMemory(_))));
    assert_eq!(gateway.allocate_array_nothrow(3 * FIRST_OBJECT), Ok(None));

    // Releasing a null result is always allowed.
    unsafe {
        gateway.deallocate(std::ptr::null_mut());
        assert_eq!(gateway.deallocate_array(std::ptr::null_mut()), Ok(()));
    }
    assert_eq!(gateway.stats().live_blocks(), 0);
}

#[test]
fn test_subclass_memory_exhaustion() {
    let _serial = serial();
    let _no_handler = NewHandlerGuard::cleared();
    let gateway = gateway();
    let _reduced = HeapLimitGuard::new(&**gateway.collector(), HEAP_LADDER[0]);
    let ops = gateway.collectable();

    let thrown = ops.allocate(FIRST_OBJECT).map_err(GcError::from);
    assert!(thrown.unwrap_err().is_out_of_memory());
    assert!(ops.allocate_nothrow(FIRST_OBJECT).is_none());
    assert_eq!(gateway.stats().failed_allocations, 2);
}

#[test]
fn test_global_throwing_new_handler() {
    let _serial = serial();
    let gateway = gateway();
    let _reduced = HeapLimitGuard::new(&**gateway.collector(), HEAP_LADDER[0]);
    let seen = Arc::new(AtomicUsize::new(0));
    let _handler = throwing_handler(&seen);

    assert!(gateway.allocate(FIRST_OBJECT).is_err());
    assert_eq!(seen.swap(0, Ordering::SeqCst), 1);

    assert!(gateway.allocate_nothrow(FIRST_OBJECT).is_none());
    assert_eq!(seen.swap(0, Ordering::SeqCst), 1);

    assert!(matches!(
        gateway.allocate_array(3 * FIRST_OBJECT),
        Err(GcError::OutOfMemory(_))
    ));
    assert_eq!(seen.swap(0, Ordering::SeqCst), 1);

    assert_eq!(gateway.allocate_array_nothrow(3 * FIRST_OBJECT), Ok(None));
    assert_eq!(seen.swap(0, Ordering::SeqCst), 1);
}

#[test]
fn test_subclass_throwing_new_handler() {
    let _serial = serial();
    let gateway = gateway();
    let _reduced = HeapLimitGuard::new(&**gateway.collector(), HEAP_LADDER[0]);
    let seen = Arc::new(AtomicUsize::new(0));
    let _handler = throwing_handler(&seen);

    assert!(gateway.collectable().allocate(FIRST_OBJECT).is_err());
    assert_eq!(seen.swap(0, Ordering::SeqCst), 1);

    assert!(gateway.collectable().allocate_nothrow(FIRST_OBJECT).is_none());
    assert_eq!(seen.swap(0, Ordering::SeqCst), 1);
}

#[test]
fn test_global_non_throwing_new_handler() {
    let _serial = serial();

    for nothrow in [false, true] {
        let gateway = gateway();
        let _reduced = HeapLimitGuard::new(&**gateway.collector(), HEAP_LADDER[0]);
        let heap = Heap::new(gateway.collector());
        let seen = Arc::new(AtomicUsize::new(0));
        let _handler = growing_handler(&seen, &heap);

        let block = if nothrow {
            gateway.allocate_nothrow(FIRST_OBJECT)
        } else {
            gateway.allocate(FIRST_OBJECT).ok()
        };
        let block = block.expect("handler made room");
        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert_eq!(heap.index(), 1);
        assert_eq!(gateway.collector().heap_limit(), HEAP_LADDER[1]);

        unsafe { gateway.deallocate(block.as_ptr()) };
    }
}

#[test]
fn test_subclass_non_throwing_new_handler() {
    let _serial = serial();
    let gateway = gateway();
    let _reduced = HeapLimitGuard::new(&**gateway.collector(), HEAP_LADDER[0]);
    let heap = Heap::new(gateway.collector());
    let seen = Arc::new(AtomicUsize::new(0));
    let _handler = growing_handler(&seen, &heap);

    let block = gateway
        .collectable()
        .allocate(FIRST_OBJECT)
        .expect("handler made room");
    assert_eq!(seen.load(Ordering::SeqCst), 1);
    assert_eq!(heap.index(), 1);

    unsafe { gateway.collectable().deallocate(block.as_ptr()) };
    assert_eq!(gateway.stats().collectable_blocks, 0);
}

#[test]
fn test_handler_runs_until_room_is_made() {
    let _serial = serial();
    let gateway = gateway();
    let _reduced = HeapLimitGuard::new(&**gateway.collector(), 32);
    let calls = Arc::new(AtomicUsize::new(0));

    let collector = Arc::clone(gateway.collector());
    let counter = Arc::clone(&calls);
    let _handler = NewHandlerGuard::new(Arc::new(move || {
        if counter.fetch_add(1, Ordering::SeqCst) + 1 == 3 {
            collector.set_heap_limit(0);
        }
        Ok(())
    }));

    let finalized = Arc::new(AtomicUsize::new(0));
    let object = gateway
        .new_collectable(MyCollectable::new(&finalized))
        .expect("third handler call lifts the limit");
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert!(object.collectable_base().is_registered());
}

#[test]
fn test_typed_exhaustion_leaves_value_unallocated() {
    let _serial = serial();
    let _no_handler = NewHandlerGuard::cleared();
    let gateway = gateway();
    let _reduced = HeapLimitGuard::new(&**gateway.collector(), 16);
    let finalized = Arc::new(AtomicUsize::new(0));

    assert!(gateway.new_collectable(MyCollectable::new(&finalized)).is_err());
    assert!(gateway.new_collectable_nothrow(MyCollectable::new(&finalized)).is_none());
    assert!(gateway.new_object_nothrow([0u64; 4]).is_none());

    // The rejected values were dropped on the stack, never finalized.
    assert_eq!(finalized.load(Ordering::SeqCst), 2);
    assert_eq!(gateway.stats().finalized, 0);
}

#[test]
fn test_new_delete() {
    let gateway = gateway();
    let finalized = Arc::new(AtomicUsize::new(0));

    let object = gateway
        .new_collectable(MyCollectable::new(&finalized))
        .expect("allocation");
    unsafe { gateway.delete_collectable(object) };
    assert_eq!(finalized.load(Ordering::SeqCst), 1);

    for _ in 0..3 {
        gateway.force_collect();
    }
    assert_eq!(finalized.load(Ordering::SeqCst), 1);
    assert_eq!(gateway.stats().registered_finalizers, 0);
}

#[test]
fn test_zero_size_allocations() {
    let gateway = gateway();
    let blocks = [
        gateway.allocate(0).ok(),
        gateway.allocate_nothrow(0),
        gateway.collectable().allocate(0).ok(),
        gateway.collectable().allocate_nothrow(0),
    ];
    let blocks: Vec<_> = blocks.into_iter().map(|b| b.expect("zero-size request")).collect();
    for (i, a) in blocks.iter().enumerate() {
        for b in &blocks[i + 1..] {
            assert_ne!(a, b);
        }
    }

    unsafe {
        gateway.deallocate(blocks[0].as_ptr());
        gateway.deallocate_nothrow(blocks[1].as_ptr());
        gateway.collectable().deallocate(blocks[2].as_ptr());
        gateway.collectable().deallocate_nothrow(blocks[3].as_ptr());
    }
    assert_eq!(gateway.stats().live_blocks(), 0);
}

#[test]
fn test_finalizer_fires_exactly_once() {
    const N: usize = 64;
    let gateway = gateway();
    let finalized = Arc::new(AtomicUsize::new(0));

    let objects: Vec<_> = (0..N)
        .map(|_| gateway.new_collectable(MyCollectable::new(&finalized)).expect("allocation"))
        .collect();
    gateway.force_collect();
    assert_eq!(finalized.load(Ordering::SeqCst), 0);

    drop(objects);
    for _ in 0..4 {
        gateway.force_collect();
    }
    assert_eq!(finalized.load(Ordering::SeqCst), N);

    let stats = gateway.stats();
    assert_eq!(stats.finalized, N as u64);
    assert_eq!(stats.collectable_blocks, 0);
}

#[test]
fn test_copy_registers_its_own_finalizer() {
    let gateway = gateway();
    let finalized = Arc::new(AtomicUsize::new(0));

    let original = gateway
        .new_collectable(MyCollectable::new(&finalized))
        .expect("allocation");
    let copy = gateway
        .new_collectable((*original).clone())
        .expect("allocation");
    assert!(copy.collectable_base().is_registered());
    assert_eq!(gateway.stats().registered_finalizers, 2);

    drop(copy);
    for _ in 0..2 {
        gateway.force_collect();
    }
    assert_eq!(finalized.load(Ordering::SeqCst), 1);
    assert!(original.collectable_base().is_registered());

    drop(original);
    for _ in 0..3 {
        gateway.force_collect();
    }
    assert_eq!(finalized.load(Ordering::SeqCst), 2);
    let stats = gateway.stats();
    assert_eq!(stats.finalized, 2);
    assert_eq!(stats.collectable_blocks, 0);
}

#[test]
fn test_stack_and_embedded_instances_are_not_registered() {
    let gateway = gateway();
    let finalized = Arc::new(AtomicUsize::new(0));

    {
        let local = MyCollectable::new(&finalized);
        assert!(!attach(&local, gateway.collector()));
    }
    assert_eq!(finalized.load(Ordering::SeqCst), 1);

    struct Aggregate {
        member: MyCollectable,
    }

    let aggregate = gateway
        .new_object(Aggregate {
            member: MyCollectable::new(&finalized),
        })
        .expect("allocation");
    assert!(!attach(&aggregate.member, gateway.collector()));
    assert_eq!(gateway.stats().registered_finalizers, 0);

    gateway.force_collect();
    assert_eq!(finalized.load(Ordering::SeqCst), 1);
    drop(aggregate);
    assert_eq!(finalized.load(Ordering::SeqCst), 2);
}

#[test]
fn test_array_forms_always_fail() {
    let _serial = serial();
    let sink = Arc::new(CollectingSink::new());
    let previous = set_diagnostic_sink(Some(sink.clone()));

    let gateway = gateway();
    let ops = gateway.collectable();
    for size in [0, 1, 4096] {
        assert_eq!(ops.allocate_array(size), Err(GcError::ArrayNewNotSupported));
        assert_eq!(ops.allocate_array_nothrow(size), Err(GcError::ArrayNewNotSupported));
    }

    let block = ops.allocate(32).expect("single allocation");
    unsafe {
        for ptr in [std::ptr::null_mut(), block.as_ptr()] {
            assert_eq!(ops.deallocate_array(ptr), Err(GcError::ArrayDeleteNotSupported));
            assert_eq!(ops.deallocate_array_nothrow(ptr), Err(GcError::ArrayDeleteNotSupported));
        }
    }
    assert_eq!(gateway.stats().collectable_blocks, 1, "array delete left the block alone");
    unsafe { ops.deallocate(block.as_ptr()) };

    set_diagnostic_sink(previous);
    assert!(sink.contains("GC001"));
    assert!(sink.contains("GC002"));
    assert!(GcError::ArrayNewNotSupported.is_not_supported());
}

#[test]
fn test_reachability_via_uncollectable_holder() {
    let gateway = gateway();
    let finalized = Arc::new(AtomicUsize::new(0));

    let object = gateway
        .new_collectable(MyCollectable::new(&finalized))
        .expect("allocation");
    let holder: UncollectableBox<Gc<MyCollectable>> =
        gateway.new_object(object.as_gc()).expect("holder");
    drop(object);

    for _ in 0..3 {
        gateway.force_collect();
    }
    assert_eq!(finalized.load(Ordering::SeqCst), 0);
    assert!(unsafe { holder.as_ref() }.collectable_base().is_registered());

    drop(holder);
    gateway.force_collect();
    assert_eq!(finalized.load(Ordering::SeqCst), 1);
}

#[test]
fn test_collectable_graph_is_traced() {
    struct Link {
        base: CollectableBase,
        next: Option<Gc<Link>>,
        finalized: Arc<AtomicUsize>,
    }

    impl Collectable for Link {
        fn collectable_base(&self) -> &CollectableBase {
            &self.base
        }
    }

    impl Drop for Link {
        fn drop(&mut self) {
            self.finalized.fetch_add(1, Ordering::SeqCst);
        }
    }

    let gateway = gateway();
    let finalized = Arc::new(AtomicUsize::new(0));
    let mut head: Option<Gc<Link>> = None;
    let mut root = None;
    for _ in 0..10 {
        let link = gateway
            .new_collectable(Link {
                base: CollectableBase::new(),
                next: head,
                finalized: Arc::clone(&finalized),
            })
            .expect("allocation");
        head = Some(link.as_gc());
        root = Some(link);
    }

    gateway.force_collect();
    assert_eq!(finalized.load(Ordering::SeqCst), 0, "the head root keeps the chain alive");

    drop(root);
    for _ in 0..12 {
        gateway.force_collect();
    }
    assert_eq!(finalized.load(Ordering::SeqCst), 10);
}

#[test]
fn test_heap_limit_guard_applies_and_restores() {
    let gateway = gateway();
    let collector = gateway.collector();
    assert_eq!(collector.heap_limit(), 0);
    {
        let guard = HeapLimitGuard::new(&**collector, HEAP_LADDER[0]);
        assert_eq!(guard.limit(), HEAP_LADDER[0]);
        assert_eq!(collector.heap_limit(), HEAP_LADDER[0]);
        assert!(guard.raise(HEAP_LADDER[1]));
        assert_eq!(collector.heap_limit(), HEAP_LADDER[1]);
    }
    assert_eq!(collector.heap_limit(), 0);
}

#[test]
fn test_multithread_collectable_allocation() {
    const THREADS: usize = 4;
    const PER_THREAD: usize = 100;
    let gateway = gateway();
    let finalized = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let gateway = gateway.clone();
            let finalized = Arc::clone(&finalized);
            thread::spawn(move || {
                for i in 0..PER_THREAD {
                    let object = gateway
                        .new_collectable(MyCollectable::new(&finalized))
                        .expect("allocation");
                    if i % 10 == 0 {
                        gateway.force_collect();
                    }
                    drop(object);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("worker panicked");
    }

    for _ in 0..3 {
        gateway.force_collect();
    }
    assert_eq!(finalized.load(Ordering::SeqCst), THREADS * PER_THREAD);
    assert_eq!(gateway.stats().collectable_blocks, 0);
}

#[test]
fn test_global_gateway() {
    let first = AllocationGateway::global().expect("global gateway");
    let second = AllocationGateway::global().expect("global gateway");
    assert!(std::ptr::eq(first, second));

    let finalized = Arc::new(AtomicUsize::new(0));
    let boxed = first.new_object(7u32).expect("allocation");
    assert_eq!(*boxed, 7);
    drop(first.new_collectable(MyCollectable::new(&finalized)));
}
