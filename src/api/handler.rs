//! The process-wide out-of-memory handler and the retry loop built on it.
//!
//! Every throwing allocation entry point runs the same loop: try the
//! collector; on null, give up if no handler is installed, otherwise call
//! the handler and try again. A handler returns `Ok(())` once it has made
//! room (the request is retried) or `Err` to abandon the request.
//!
//! The handler slot is read once per failed attempt and the handler is then
//! called with no lock held. A handler installed or removed concurrently
//! with an in-flight allocation may therefore be missed by that allocation;
//! callers that swap handlers while other threads allocate must coordinate
//! on their own.

use std::ptr::NonNull;
use std::sync::Arc;

use crate::api::error::AllocError;
use crate::diagnostics::{emit_with_context, GC101, GC102};
use crate::sync::mutex::Mutex;

/// Out-of-memory handler.
pub type NewHandler = Arc<dyn Fn() -> Result<(), AllocError> + Send + Sync>;

static NEW_HANDLER: Mutex<Option<NewHandler>> = Mutex::new(None);

/// Install `handler` (or remove the current one with `None`), returning the
/// previously installed handler.
pub fn set_new_handler(handler: Option<NewHandler>) -> Option<NewHandler> {
    std::mem::replace(&mut *NEW_HANDLER.lock(), handler)
}

/// The currently installed handler.
pub fn new_handler() -> Option<NewHandler> {
    NEW_HANDLER.lock().clone()
}

/// Installs a handler for a scope and reinstates the previous one on drop.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use gcgate::{new_handler, AllocError, NewHandlerGuard};
///
/// {
///     let _guard = NewHandlerGuard::new(Arc::new(|| Err(AllocError::new(0))));
///     assert!(new_handler().is_some());
/// }
/// ```
#[must_use = "the previous handler is restored when the guard is dropped"]
pub struct NewHandlerGuard {
    previous: Option<NewHandler>,
}

impl NewHandlerGuard {
    /// Install `handler` until the guard drops.
    pub fn new(handler: NewHandler) -> Self {
        Self {
            previous: set_new_handler(Some(handler)),
        }
    }

    /// Remove any handler until the guard drops.
    pub fn cleared() -> Self {
        Self {
            previous: set_new_handler(None),
        }
    }
}

impl Drop for NewHandlerGuard {
    fn drop(&mut self) {
        set_new_handler(self.previous.take());
    }
}

/// Run `attempt` until it yields memory, consulting the handler on each failure.
pub(crate) fn allocate_with_retry(
    size: usize,
    mut attempt: impl FnMut(usize) -> *mut u8,
) -> Result<NonNull<u8>, AllocError> {
    let mut retries = 0usize;
    loop {
        if let Some(ptr) = NonNull::new(attempt(size)) {
            return Ok(ptr);
        }

        let Some(handler) = new_handler() else {
            emit_with_context(
                &GC101,
                &format!("{} byte request after {} handler retries", size, retries),
            );
            return Err(AllocError::new(size));
        };

        retries += 1;
        emit_with_context(&GC102, &format!("{} byte request, attempt {}", size, retries));
        handler()?;
    }
}
