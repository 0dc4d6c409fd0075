//! Queue of finalizers waiting to run.
//!
//! The sweep pushes entries while holding the heap lock; they are popped and
//! invoked with no lock held, possibly from another thread.

use crossbeam_queue::SegQueue;

use super::Finalizer;

/// A finalization detached from its block during a sweep.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PendingFinalizer {
    pub base: usize,
    /// Block generation id at the time of queuing.
    pub block_id: u64,
    /// Block finalization sequence at the time of queuing.
    pub sequence: u64,
    pub finalizer: Finalizer,
}

/// Lock-free FIFO of pending finalizations.
#[derive(Default)]
pub(crate) struct FinalizationQueue {
    queue: SegQueue<PendingFinalizer>,
}

impl FinalizationQueue {
    pub fn push(&self, pending: PendingFinalizer) {
        self.queue.push(pending);
    }

    pub fn pop(&self) -> Option<PendingFinalizer> {
        self.queue.pop()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.queue.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ptr::NonNull;

    unsafe fn noop(_base: NonNull<u8>, _offset: usize) {}

    #[test]
    fn test_fifo_order() {
        let queue = FinalizationQueue::default();
        for id in 0..3 {
            queue.push(PendingFinalizer {
                base: 0x1000 * (id as usize + 1),
                block_id: id,
                sequence: 0,
                finalizer: Finalizer::new(noop, 0),
            });
        }
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.pop().map(|p| p.block_id), Some(0));
        assert_eq!(queue.pop().map(|p| p.block_id), Some(1));
        assert_eq!(queue.pop().map(|p| p.block_id), Some(2));
        assert!(queue.pop().is_none());
    }
}
