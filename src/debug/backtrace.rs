//! Allocation backtrace tracking.
//!
//! Records where each uncollectable block was allocated so blocks that are
//! never freed can be reported as leaks.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::sync::mutex::Mutex;
use crate::util::size::format_bytes;

/// A captured backtrace for an allocation.
#[derive(Clone)]
pub struct AllocationTrace {
    /// Block base address
    pub address: usize,

    /// Block capacity in bytes
    pub size: usize,

    /// Captured backtrace, resolved to text
    pub backtrace: String,

    /// Allocation sequence number
    pub sequence: u64,
}

impl std::fmt::Debug for AllocationTrace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AllocationTrace")
            .field("address", &format_args!("{:#x}", self.address))
            .field("size", &self.size)
            .field("sequence", &self.sequence)
            .finish()
    }
}

/// Tracker for uncollectable allocation backtraces.
pub struct BacktraceTracker {
    traces: Mutex<HashMap<usize, AllocationTrace>>,
    sequence: AtomicU64,
}

impl BacktraceTracker {
    /// Create a new backtrace tracker.
    pub fn new() -> Self {
        Self {
            traces: Mutex::new(HashMap::new()),
            sequence: AtomicU64::new(0),
        }
    }

    /// Record an allocation with its backtrace.
    pub fn record_alloc(&self, address: usize, size: usize) {
        let bt = ::backtrace::Backtrace::new();
        let trace = AllocationTrace {
            address,
            size,
            backtrace: format!("{:?}", bt),
            sequence: self.sequence.fetch_add(1, Ordering::Relaxed),
        };
        self.traces.lock().insert(address, trace);
    }

    /// Remove an allocation record.
    pub fn record_free(&self, address: usize) {
        self.traces.lock().remove(&address);
    }

    /// All allocations still outstanding, oldest first.
    pub fn active_allocations(&self) -> Vec<AllocationTrace> {
        let mut active: Vec<_> = self.traces.lock().values().cloned().collect();
        active.sort_by_key(|trace| trace.sequence);
        active
    }

    /// Log a leak report through the `log` facade.
    pub fn log_leak_report(&self) {
        let active = self.active_allocations();
        if active.is_empty() {
            log::debug!("[gcgate] no uncollectable blocks outstanding");
            return;
        }

        log::warn!("[gcgate] leak report: {} uncollectable blocks never freed", active.len());
        for trace in &active {
            log::warn!(
                "  #{} at {:#x}, {}\n{}",
                trace.sequence,
                trace.address,
                format_bytes(trace.size),
                trace.backtrace
            );
        }
    }
}

impl Default for BacktraceTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracks_outstanding_blocks() {
        let tracker = BacktraceTracker::new();
        tracker.record_alloc(0x1000, 32);
        tracker.record_alloc(0x2000, 16);
        tracker.record_free(0x1000);

        let active = tracker.active_allocations();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].address, 0x2000);
        assert_eq!(active[0].sequence, 1);
    }
}
