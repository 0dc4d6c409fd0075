//! Diagnostics for allocator misuse and exhaustion.
//!
//! This module provides:
//! - **Runtime diagnostics**: coded messages routed to `log` and stderr
//! - **Strict mode**: Optional panic-on-error for CI
//!
//! ## Diagnostic Codes
//!
//! | Code  | Meaning                               |
//! |-------|---------------------------------------|
//! | GC0xx | Collectable type misuse (array forms) |
//! | GC1xx | Memory exhaustion and handler retries |
//! | GC2xx | Collector bookkeeping                 |

pub mod emit;
pub mod kind;
pub mod strict;

pub use emit::{emit, emit_with_context, set_diagnostic_sink, suppress_diagnostics, CollectingSink, DiagnosticSink};
pub use kind::{Diagnostic, DiagnosticKind};
pub use kind::{GC001, GC002, GC101, GC102, GC201, GC202};
pub use strict::{init_from_env, set_strict_mode, strict_mode, StrictMode, StrictModeGuard};
