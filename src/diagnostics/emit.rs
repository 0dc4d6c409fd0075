//! Diagnostic emission backend.
//!
//! Every diagnostic goes to the `log` facade and to the installed
//! [`DiagnosticSink`], if any. Debug builds (or the `diagnostics` feature)
//! additionally print a rustc-style block to stderr.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::kind::{Diagnostic, DiagnosticKind};
use super::strict::should_panic;
use crate::sync::mutex::Mutex;

/// Global flag to suppress diagnostic output (for testing).
static DIAGNOSTICS_SUPPRESSED: AtomicBool = AtomicBool::new(false);

/// Sink receiving every emitted diagnostic.
static SINK: Mutex<Option<Arc<dyn DiagnosticSink>>> = Mutex::new(None);

/// Install (or remove) the diagnostic sink, returning the previous one.
pub fn set_diagnostic_sink(sink: Option<Arc<dyn DiagnosticSink>>) -> Option<Arc<dyn DiagnosticSink>> {
    std::mem::replace(&mut *SINK.lock(), sink)
}

/// Suppress all diagnostic output.
pub fn suppress_diagnostics(suppress: bool) {
    DIAGNOSTICS_SUPPRESSED.store(suppress, Ordering::Relaxed);
}

/// Check if diagnostics are suppressed.
pub fn is_suppressed() -> bool {
    DIAGNOSTICS_SUPPRESSED.load(Ordering::Relaxed)
}

/// Emit a diagnostic.
pub fn emit(diag: &Diagnostic) {
    emit_inner(diag, None);
}

/// Emit a diagnostic with additional runtime context.
pub fn emit_with_context(diag: &Diagnostic, context: &str) {
    emit_inner(diag, Some(context));
}

fn emit_inner(diag: &Diagnostic, context: Option<&str>) {
    if is_suppressed() {
        return;
    }

    emit_to_log(diag, context);

    let sink = SINK.lock().clone();
    if let Some(sink) = sink {
        sink.emit(diag);
    }

    #[cfg(any(debug_assertions, feature = "diagnostics"))]
    emit_to_stderr(diag, context);

    if diag.kind == DiagnosticKind::Error && should_panic() {
        panic!(
            "[gcgate][{}] {}\nStrict mode enabled - errors are fatal.",
            diag.code, diag.message
        );
    }
}

fn emit_to_log(diag: &Diagnostic, context: Option<&str>) {
    let context = context.unwrap_or("");
    match diag.kind {
        DiagnosticKind::Error => log::error!("[{}] {} {}", diag.code, diag.message, context),
        DiagnosticKind::Warning => log::warn!("[{}] {} {}", diag.code, diag.message, context),
        DiagnosticKind::Note => log::debug!("[{}] {} {}", diag.code, diag.message, context),
    }
}

#[cfg(any(debug_assertions, feature = "diagnostics"))]
fn emit_to_stderr(diag: &Diagnostic, context: Option<&str>) {
    // Notes are routine (handler retries); keep them out of stderr.
    if diag.kind == DiagnosticKind::Note {
        return;
    }

    eprintln!("[gcgate][{}] {}: {}", diag.code, diag.kind.prefix(), diag.message);
    if let Some(context) = context {
        eprintln!("  context: {}", context);
    }
    if let Some(note) = diag.note {
        eprintln!("  note: {}", note);
    }
    if let Some(help) = diag.help {
        eprintln!("  help: {}", help);
    }
    eprintln!();
}

/// A diagnostic sink trait for custom output.
pub trait DiagnosticSink: Send + Sync {
    /// Handle a diagnostic.
    fn emit(&self, diag: &Diagnostic);
}

/// A simple sink that collects diagnostics.
#[derive(Default)]
pub struct CollectingSink {
    diagnostics: Mutex<Vec<Diagnostic>>,
}

impl CollectingSink {
    /// Create a new collecting sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all collected diagnostics.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.diagnostics.lock().clone()
    }

    /// Clear collected diagnostics.
    pub fn clear(&self) {
        self.diagnostics.lock().clear();
    }

    /// Check if any diagnostic with the given code was collected.
    pub fn contains(&self, code: &str) -> bool {
        self.diagnostics.lock().iter().any(|d| d.code == code)
    }

    /// Check if any errors were collected.
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .lock()
            .iter()
            .any(|d| d.kind == DiagnosticKind::Error)
    }
}

impl DiagnosticSink for CollectingSink {
    fn emit(&self, diag: &Diagnostic) {
        self.diagnostics.lock().push(diag.clone());
    }
}
