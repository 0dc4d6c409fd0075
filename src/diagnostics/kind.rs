//! Diagnostic kinds and core types.
//!
//! Mirrors rustc's diagnostic levels for familiar UX.

/// The severity level of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// A hard error - something is definitely wrong.
    Error,
    /// A warning - something is probably wrong or suboptimal.
    Warning,
    /// Additional context about another diagnostic.
    Note,
}

impl DiagnosticKind {
    /// Get the display prefix for this kind.
    pub fn prefix(&self) -> &'static str {
        match self {
            DiagnosticKind::Error => "error",
            DiagnosticKind::Warning => "warning",
            DiagnosticKind::Note => "note",
        }
    }
}

/// A diagnostic message with code, message, and optional context.
///
/// Diagnostic codes follow the pattern:
/// - `GC0xx` - Collectable type misuse
/// - `GC1xx` - Memory exhaustion
/// - `GC2xx` - Collector bookkeeping
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Severity level.
    pub kind: DiagnosticKind,
    /// Diagnostic code (e.g., "GC001").
    pub code: &'static str,
    /// Primary message.
    pub message: &'static str,
    /// Optional additional context.
    pub note: Option<&'static str>,
    /// Optional fix suggestion.
    pub help: Option<&'static str>,
}

impl Diagnostic {
    /// Create a new error diagnostic.
    pub const fn error(code: &'static str, message: &'static str) -> Self {
        Self {
            kind: DiagnosticKind::Error,
            code,
            message,
            note: None,
            help: None,
        }
    }

    /// Create a new warning diagnostic.
    pub const fn warning(code: &'static str, message: &'static str) -> Self {
        Self {
            kind: DiagnosticKind::Warning,
            code,
            message,
            note: None,
            help: None,
        }
    }

    /// Create a new note diagnostic.
    pub const fn note(code: &'static str, message: &'static str) -> Self {
        Self {
            kind: DiagnosticKind::Note,
            code,
            message,
            note: None,
            help: None,
        }
    }

    /// Add a note to this diagnostic.
    pub const fn with_note(mut self, note: &'static str) -> Self {
        self.note = Some(note);
        self
    }

    /// Add a help message to this diagnostic.
    pub const fn with_help(mut self, help: &'static str) -> Self {
        self.help = Some(help);
        self
    }
}

// =============================================================================
// Predefined diagnostics (GC0xx - Collectable type misuse)
// =============================================================================

/// GC001: Array allocation requested for a collectable type.
pub const GC001: Diagnostic = Diagnostic::error(
    "GC001",
    "array allocation requested for a collectable type"
).with_note("a single finalizer cannot finalize each element of an array")
 .with_help("allocate elements individually with new_collectable(), or hold them in an uncollectable container");

/// GC002: Array deallocation requested for a collectable type.
pub const GC002: Diagnostic = Diagnostic::error(
    "GC002",
    "array deallocation requested for a collectable type"
).with_note("collectable arrays can never have been allocated")
 .with_help("release single objects with delete_collectable(), or let the collector reclaim them");

// =============================================================================
// Predefined diagnostics (GC1xx - Memory exhaustion)
// =============================================================================

/// GC101: Heap limit exhausted.
pub const GC101: Diagnostic = Diagnostic::warning(
    "GC101",
    "collector heap exhausted, allocation failed"
).with_note("the request does not fit under the configured heap limit, even after a collection")
 .with_help("raise the heap limit, or install an out-of-memory handler that releases memory");

/// GC102: Out-of-memory handler invoked.
pub const GC102: Diagnostic = Diagnostic::note(
    "GC102",
    "out-of-memory handler invoked before retrying allocation"
);

// =============================================================================
// Predefined diagnostics (GC2xx - Collector bookkeeping)
// =============================================================================

/// GC201: Free of an address that is not a block base.
pub const GC201: Diagnostic = Diagnostic::error(
    "GC201",
    "free called with an address that is not the start of a collector block"
).with_note("the request was ignored")
 .with_help("only pass pointers returned by the gateway's allocation operators to its deallocation operators");

/// GC202: Finalizer registration on memory outside the collectable region.
pub const GC202: Diagnostic = Diagnostic::warning(
    "GC202",
    "finalizer registration ignored for memory outside the collectable region"
).with_note("uncollectable and foreign memory is never finalized automatically");
