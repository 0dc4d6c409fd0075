//! # gcgate
//!
//! Collector-backed allocation with finalization for Rust.
//!
//! ## Features
//!
//! - Allocation gateway routing general-purpose memory into a collector's
//!   scanned, uncollectable region
//! - Collectable objects reclaimed automatically, with their `Drop` run by
//!   a finalizer once the collector proves them unreachable
//! - Out-of-memory handler chain with throwing and non-throwing entry points
//! - Array allocation of collectable types rejected loudly
//! - Bundled conservative mark-and-sweep collector, or bring your own
//!   through the [`Collector`] trait
//! - Scoped heap limits for exercising exhaustion paths
//! - Non-copyable marker and lazily constructed singletons
//! - std::alloc::Allocator implementation (nightly)
//!
//! ## Quick Start
//!
//! ```rust
//! use gcgate::{AllocationGateway, Collectable, CollectableBase, CollectorConfig};
//!
//! struct Session {
//!     base: CollectableBase,
//!     id: u64,
//! }
//!
//! impl Collectable for Session {
//!     fn collectable_base(&self) -> &CollectableBase {
//!         &self.base
//!     }
//! }
//!
//! let gateway = AllocationGateway::with_config(CollectorConfig::minimal());
//!
//! let session = gateway.new_collectable(Session { base: CollectableBase::new(), id: 1 })?;
//! assert_eq!(session.id, 1);
//!
//! // Once the last root is gone the collector finalizes the object.
//! drop(session);
//! gateway.force_collect();
//! assert_eq!(gateway.stats().finalized, 1);
//! # Ok::<(), gcgate::GcError>(())
//! ```
//!
//! ## Environment
//!
//! The global gateway ([`AllocationGateway::global`]) reads
//! `GCGATE_MAXIMUM_HEAP_SIZE`, `GCGATE_DONT_GC`, `GCGATE_FINALIZE_ON_DEMAND`
//! and `GCGATE_STRICT` on first use.

#![cfg_attr(feature = "nightly", feature(allocator_api))]

pub mod api;
pub mod collector;
pub mod diagnostics;

mod core;
mod sync;
mod util;

#[cfg(feature = "debug")]
pub mod debug;

// Re-export public API at crate root for convenience
pub use api::collectable::{attach, finalize_object, Collectable, CollectableBase, CollectableOperators};
pub use api::config::CollectorConfig;
pub use api::error::{AllocError, GcError, GcResult};
pub use api::gateway::AllocationGateway;
pub use api::handler::{new_handler, set_new_handler, NewHandler, NewHandlerGuard};
pub use api::operators::AllocationOperators;
pub use api::pointers::{Gc, Root};
pub use api::scope::HeapLimitGuard;
pub use api::stats::CollectorStats;
pub use api::wrappers::UncollectableBox;

// Utilities
pub use api::noncopyable::NonCopyable;
pub use api::singleton::{Singleton, SingletonCell, SingletonToken};

// Collector capability
pub use collector::{Collector, Finalizer, FinalizerFn, MarkSweepCollector, Region};

// Allocator trait implementation (nightly only)
#[cfg(feature = "nightly")]
pub use api::allocator_impl::UncollectableAllocator;

// Diagnostics - Core types and predefined codes
pub use diagnostics::{Diagnostic, DiagnosticKind};
pub use diagnostics::{StrictMode, set_strict_mode, StrictModeGuard};
pub use diagnostics::{set_diagnostic_sink, CollectingSink, DiagnosticSink};
pub use diagnostics::{GC001, GC002, GC101, GC102, GC201, GC202};

// Size helpers
pub use util::layout::GRANULE;
pub use util::size::{kb, mb};

/// Serialises unit tests that touch process-wide state (handler, strict mode).
#[cfg(test)]
pub(crate) static GLOBAL_TEST_LOCK: sync::mutex::Mutex<()> = sync::mutex::Mutex::new(());
