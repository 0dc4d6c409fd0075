//! Mutex wrapper - uses parking_lot if available, std otherwise.
//!
//! Finalizers run user code, and a panicking finalizer must not wedge the
//! collector, so the std fallback recovers the guard from a poisoned lock
//! instead of propagating the poison.

#[cfg(feature = "parking_lot")]
pub use parking_lot::Mutex;

#[cfg(not(feature = "parking_lot"))]
mod std_mutex {
    use std::sync::{Mutex as StdMutex, MutexGuard as StdMutexGuard, PoisonError};

    /// Thin wrapper around std::sync::Mutex that ignores poisoning.
    pub struct Mutex<T>(StdMutex<T>);

    impl<T> Mutex<T> {
        /// Create a new mutex.
        pub const fn new(value: T) -> Self {
            Self(StdMutex::new(value))
        }

        /// Lock the mutex.
        pub fn lock(&self) -> MutexGuard<'_, T> {
            MutexGuard(self.0.lock().unwrap_or_else(PoisonError::into_inner))
        }

        /// Mutable access without locking; requires exclusive ownership.
        pub fn get_mut(&mut self) -> &mut T {
            self.0.get_mut().unwrap_or_else(PoisonError::into_inner)
        }
    }

    impl<T: Default> Default for Mutex<T> {
        fn default() -> Self {
            Self::new(T::default())
        }
    }

    /// Guard for std mutex.
    pub struct MutexGuard<'a, T>(StdMutexGuard<'a, T>);

    impl<'a, T> std::ops::Deref for MutexGuard<'a, T> {
        type Target = T;

        fn deref(&self) -> &Self::Target {
            &self.0
        }
    }

    impl<'a, T> std::ops::DerefMut for MutexGuard<'a, T> {
        fn deref_mut(&mut self) -> &mut Self::Target {
            &mut self.0
        }
    }
}

#[cfg(not(feature = "parking_lot"))]
pub use std_mutex::Mutex;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_survives_panicking_holder() {
        let mutex = std::sync::Arc::new(Mutex::new(0u32));

        let poisoner = std::sync::Arc::clone(&mutex);
        let result = std::thread::spawn(move || {
            let _guard = poisoner.lock();
            panic!("finalizer blew up");
        })
        .join();
        assert!(result.is_err());

        *mutex.lock() += 1;
        assert_eq!(*mutex.lock(), 1);
    }
}
