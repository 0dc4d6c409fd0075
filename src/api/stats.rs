//! Collector statistics.

use crate::util::size::{format_bytes, format_limit};

/// Snapshot of collector state and lifetime counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectorStats {
    /// Bytes charged to live collectable blocks.
    pub collectable_bytes: usize,

    /// Bytes charged to live uncollectable blocks.
    pub uncollectable_bytes: usize,

    /// Live collectable blocks.
    pub collectable_blocks: usize,

    /// Live uncollectable blocks.
    pub uncollectable_blocks: usize,

    /// Peak bytes charged (high water mark).
    pub peak_bytes: usize,

    /// Current heap limit (0 = unlimited).
    pub heap_limit: usize,

    /// Collections run.
    pub collections: u64,

    /// Finalizers invoked.
    pub finalized: u64,

    /// Blocks reclaimed by sweeps.
    pub reclaimed: u64,

    /// Blocks released explicitly.
    pub freed: u64,

    /// Blocks with an active finalizer registration.
    pub registered_finalizers: usize,

    /// Finalizations queued but not yet run.
    pub pending_finalizers: usize,

    /// Explicit roots held.
    pub roots: usize,

    /// Allocation requests answered with null.
    pub failed_allocations: u64,
}

impl CollectorStats {
    /// Create empty stats.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total bytes charged against the heap limit.
    pub fn heap_bytes(&self) -> usize {
        self.collectable_bytes + self.uncollectable_bytes
    }

    /// Total live blocks.
    pub fn live_blocks(&self) -> usize {
        self.collectable_blocks + self.uncollectable_blocks
    }
}

impl std::fmt::Display for CollectorStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Collector Statistics:")?;
        writeln!(f, "  Heap:            {} of {}", format_bytes(self.heap_bytes()), format_limit(self.heap_limit))?;
        writeln!(f, "  Peak:            {}", format_bytes(self.peak_bytes))?;
        writeln!(f, "  Collectable:     {} blocks, {}", self.collectable_blocks, format_bytes(self.collectable_bytes))?;
        writeln!(f, "  Uncollectable:   {} blocks, {}", self.uncollectable_blocks, format_bytes(self.uncollectable_bytes))?;
        writeln!(f, "  Collections:     {}", self.collections)?;
        writeln!(f, "  Finalized:       {}", self.finalized)?;
        writeln!(f, "  Reclaimed:       {}", self.reclaimed)?;
        writeln!(f, "  Freed:           {}", self.freed)?;
        writeln!(f, "  Finalizers:      {} registered, {} pending", self.registered_finalizers, self.pending_finalizers)?;
        writeln!(f, "  Roots:           {}", self.roots)?;
        writeln!(f, "  Failed allocs:   {}", self.failed_allocations)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_totals_and_display() {
        let stats = CollectorStats {
            collectable_bytes: 64,
            uncollectable_bytes: 32,
            collectable_blocks: 2,
            uncollectable_blocks: 1,
            ..CollectorStats::new()
        };
        assert_eq!(stats.heap_bytes(), 96);
        assert_eq!(stats.live_blocks(), 3);

        let text = stats.to_string();
        assert!(text.contains("96 B of unlimited"));
        assert!(text.contains("Collectable:     2 blocks"));
    }
}
