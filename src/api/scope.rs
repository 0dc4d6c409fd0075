//! Scoped heap limits.

use crate::collector::Collector;
use crate::util::size::format_limit;

/// Caps the collector heap for a scope.
///
/// The limit takes effect as soon as the guard is constructed; dropping the
/// guard reinstates the limit that was in force before.
///
/// # Example
///
/// ```rust
/// use gcgate::{Collector, CollectorConfig, HeapLimitGuard, MarkSweepCollector};
///
/// let collector = MarkSweepCollector::new(CollectorConfig::minimal());
/// {
///     let _limit = HeapLimitGuard::new(&collector, 4096);
///     assert_eq!(collector.heap_limit(), 4096);
///     assert!(collector.allocate_uncollectable(8192).is_null());
/// }
/// assert_eq!(collector.heap_limit(), 0);
/// ```
#[must_use = "the limit is lifted again when the guard is dropped"]
pub struct HeapLimitGuard<'a> {
    collector: &'a dyn Collector,
    previous: usize,
}

impl<'a> HeapLimitGuard<'a> {
    /// Apply a heap limit of `bytes` (0 = unlimited) until the guard drops.
    pub fn new(collector: &'a dyn Collector, bytes: usize) -> Self {
        let previous = collector.heap_limit();
        collector.set_heap_limit(bytes);
        log::debug!(
            "[gcgate] heap limit {} -> {}",
            format_limit(previous),
            format_limit(bytes)
        );
        Self {
            collector,
            previous,
        }
    }

    /// The limit currently in force.
    pub fn limit(&self) -> usize {
        self.collector.heap_limit()
    }

    /// The limit reinstated on drop.
    pub fn previous(&self) -> usize {
        self.previous
    }

    /// Raise the limit to `bytes`; 0 lifts it. Never lowers the limit.
    ///
    /// Returns true if the limit changed.
    pub fn raise(&self, bytes: usize) -> bool {
        let current = self.collector.heap_limit();
        let raises = current != 0 && (bytes == 0 || bytes > current);
        if raises {
            self.collector.set_heap_limit(bytes);
            log::debug!(
                "[gcgate] heap limit raised {} -> {}",
                format_limit(current),
                format_limit(bytes)
            );
        }
        raises
    }
}

impl<'a> Drop for HeapLimitGuard<'a> {
    fn drop(&mut self) {
        self.collector.set_heap_limit(self.previous);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::config::CollectorConfig;
    use crate::collector::MarkSweepCollector;
    use crate::util::size::kb;

    #[test]
    fn test_guard_applies_on_construction() {
        let collector = MarkSweepCollector::new(CollectorConfig::minimal().with_heap_limit(kb(64)));
        {
            let guard = HeapLimitGuard::new(&collector, kb(1));
            assert_eq!(collector.heap_limit(), kb(1));
            assert_eq!(guard.previous(), kb(64));
            assert!(collector.allocate_uncollectable(kb(2)).is_null());
        }
        assert_eq!(collector.heap_limit(), kb(64));
    }

    #[test]
    fn test_raise_never_lowers() {
        let collector = MarkSweepCollector::new(CollectorConfig::minimal());
        let guard = HeapLimitGuard::new(&collector, kb(4));
        assert!(!guard.raise(kb(2)));
        assert_eq!(guard.limit(), kb(4));
        assert!(guard.raise(kb(12)));
        assert_eq!(guard.limit(), kb(12));
        assert!(guard.raise(0));
        assert_eq!(guard.limit(), 0);
        assert!(!guard.raise(kb(1)));
    }
}
