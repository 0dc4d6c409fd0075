//! Debug utilities for tracking collector blocks.
//!
//! Only compiled when the `debug` feature is enabled, and only active for
//! collectors whose config sets `debug_mode`.

pub mod backtrace;
pub(crate) mod poison;

pub use backtrace::AllocationTrace;
