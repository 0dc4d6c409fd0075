//! Collector configuration.

use crate::util::size::{mb, parse_bytes};

/// Configuration for the bundled mark-sweep collector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectorConfig {
    /// Heap ceiling in bytes, bookkeeping included (0 = unlimited)
    pub heap_limit: usize,

    /// Collect once before reporting exhaustion
    pub collect_on_pressure: bool,

    /// Queue finalizers until `invoke_finalizers()` instead of running them
    /// at the end of each collection
    pub finalize_on_demand: bool,

    /// Collect automatically after this many collectable bytes have been
    /// allocated since the last collection (0 = never)
    pub collection_threshold: usize,

    /// Enable debug features (memory poisoning, leak tracking)
    pub debug_mode: bool,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            heap_limit: 0,
            collect_on_pressure: true,
            finalize_on_demand: false,
            collection_threshold: mb(16),
            debug_mode: cfg!(feature = "debug"),
        }
    }
}

impl CollectorConfig {
    /// A config that never collects on its own.
    ///
    /// Exhaustion is reported on the first unsatisfiable request, which keeps
    /// memory-pressure tests deterministic.
    pub fn minimal() -> Self {
        Self {
            heap_limit: 0,
            collect_on_pressure: false,
            finalize_on_demand: false,
            collection_threshold: 0,
            debug_mode: false,
        }
    }

    /// Default config overridden by the environment.
    ///
    /// - `GCGATE_MAXIMUM_HEAP_SIZE`: heap limit, with optional `k`/`m`/`g` suffix
    /// - `GCGATE_DONT_GC`: disable automatic and pressure collections
    /// - `GCGATE_FINALIZE_ON_DEMAND`: queue finalizers until invoked
    pub fn from_env() -> Self {
        Self::default().with_env_overrides(|key| std::env::var(key).ok())
    }

    fn with_env_overrides(mut self, var: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(limit) = var("GCGATE_MAXIMUM_HEAP_SIZE") {
            match parse_bytes(&limit) {
                Some(bytes) => self.heap_limit = bytes,
                None => log::warn!("ignoring unparsable GCGATE_MAXIMUM_HEAP_SIZE={:?}", limit),
            }
        }
        if var("GCGATE_DONT_GC").is_some() {
            self.collect_on_pressure = false;
            self.collection_threshold = 0;
        }
        if var("GCGATE_FINALIZE_ON_DEMAND").is_some() {
            self.finalize_on_demand = true;
        }
        self
    }

    /// Builder pattern: set heap limit.
    pub fn with_heap_limit(mut self, bytes: usize) -> Self {
        self.heap_limit = bytes;
        self
    }

    /// Builder pattern: collect before failing an allocation.
    pub fn with_collect_on_pressure(mut self, enable: bool) -> Self {
        self.collect_on_pressure = enable;
        self
    }

    /// Builder pattern: defer finalizers until explicitly invoked.
    pub fn with_finalize_on_demand(mut self, enable: bool) -> Self {
        self.finalize_on_demand = enable;
        self
    }

    /// Builder pattern: set automatic collection threshold.
    pub fn with_collection_threshold(mut self, bytes: usize) -> Self {
        self.collection_threshold = bytes;
        self
    }

    /// Builder pattern: enable debug mode.
    pub fn with_debug(mut self, enable: bool) -> Self {
        self.debug_mode = enable;
        self
    }
}
