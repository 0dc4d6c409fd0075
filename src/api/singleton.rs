//! Lazily constructed, process-wide instances.
//!
//! A [`Singleton`] type can only be built by its [`SingletonCell`]: the
//! constructor takes a [`SingletonToken`], which nothing else can create.
//! The cell constructs the instance at most once, on first access; other
//! threads block until construction finishes, and a construction that
//! reaches back into its own cell fails with
//! [`GcError::SingletonMisuse`] instead of deadlocking.

use std::any::type_name;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::OnceLock;

use crate::api::error::{GcError, GcResult};
use crate::api::noncopyable::NonCopyable;

/// Owner slot value while no thread is constructing.
const NO_OWNER: u64 = 0;

static NEXT_THREAD_TOKEN: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static THREAD_TOKEN: u64 = NEXT_THREAD_TOKEN.fetch_add(1, Ordering::Relaxed);
}

/// Nonzero token unique to the calling thread.
fn thread_token() -> u64 {
    THREAD_TOKEN.with(|token| *token)
}

/// Proof that construction was requested by a [`SingletonCell`].
pub struct SingletonToken {
    _marker: NonCopyable,
}

/// A type with exactly one process-wide instance.
///
/// # Example
///
/// ```rust
/// use gcgate::{Singleton, SingletonCell, SingletonToken};
///
/// struct Registry {
///     name: &'static str,
/// }
///
/// impl Singleton for Registry {
///     fn create(_token: SingletonToken) -> Self {
///         Registry { name: "registry" }
///     }
/// }
///
/// static REGISTRY: SingletonCell<Registry> = SingletonCell::new();
///
/// assert_eq!(REGISTRY.instance().unwrap().name, "registry");
/// assert_eq!(REGISTRY.constructions(), 1);
/// ```
pub trait Singleton: Sized + Send + Sync + 'static {
    /// Build the instance.
    fn create(token: SingletonToken) -> Self;
}

/// Holder of a [`Singleton`] instance.
pub struct SingletonCell<T> {
    instance: OnceLock<T>,
    /// Token of the constructing thread, or `NO_OWNER`.
    owner: AtomicU64,
    constructions: AtomicUsize,
}

impl<T: Singleton> SingletonCell<T> {
    /// Create an empty cell.
    pub const fn new() -> Self {
        Self {
            instance: OnceLock::new(),
            owner: AtomicU64::new(NO_OWNER),
            constructions: AtomicUsize::new(0),
        }
    }

    /// The instance, constructing it on first access.
    pub fn instance(&self) -> GcResult<&T> {
        if let Some(instance) = self.instance.get() {
            return Ok(instance);
        }

        let current = thread_token();
        if self.owner.load(Ordering::Acquire) == current {
            log::warn!("[gcgate] reentrant construction of singleton {}", type_name::<T>());
            return Err(GcError::SingletonMisuse {
                type_name: type_name::<T>(),
            });
        }

        Ok(self.instance.get_or_init(|| {
            let _claim = InitClaim::new(&self.owner, current);
            let instance = T::create(SingletonToken {
                _marker: NonCopyable::new(),
            });
            self.constructions.fetch_add(1, Ordering::Relaxed);
            log::debug!("[gcgate] singleton {} constructed", type_name::<T>());
            instance
        }))
    }

    /// The instance, if already constructed.
    pub fn get(&self) -> Option<&T> {
        self.instance.get()
    }

    /// True once the instance exists.
    pub fn is_initialized(&self) -> bool {
        self.instance.get().is_some()
    }

    /// How many times the instance has been constructed (0 or 1).
    pub fn constructions(&self) -> usize {
        self.constructions.load(Ordering::Relaxed)
    }
}

impl<T: Singleton> Default for SingletonCell<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Marks the constructing thread for the duration of `create`.
struct InitClaim<'a> {
    slot: &'a AtomicU64,
    token: u64,
}

impl<'a> InitClaim<'a> {
    fn new(slot: &'a AtomicU64, token: u64) -> Self {
        // `OnceLock` runs one initializer at a time, so the slot is free here.
        let claimed = slot
            .compare_exchange(NO_OWNER, token, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        debug_assert!(claimed, "singleton owner slot already claimed");
        Self { slot, token }
    }
}

impl Drop for InitClaim<'_> {
    fn drop(&mut self) {
        let _ = self
            .slot
            .compare_exchange(self.token, NO_OWNER, Ordering::AcqRel, Ordering::Acquire);
    }
}
