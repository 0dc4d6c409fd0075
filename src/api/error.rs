//! Error types for allocation and collectable-object operations.

use thiserror::Error;

/// The collector could not supply memory for a request.
///
/// Returned by throwing allocation entry points once the out-of-memory
/// handler chain is exhausted, and by handlers that cannot reclaim memory.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("out of memory: unable to allocate {size} bytes")]
pub struct AllocError {
    /// Size of the request that failed, in bytes.
    pub size: usize,
}

impl AllocError {
    /// Create an allocation failure for a request of `size` bytes.
    pub const fn new(size: usize) -> Self {
        Self { size }
    }
}

/// Errors raised by the allocation gateway and collectable operators.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GcError {
    /// Resource exhaustion.
    #[error(transparent)]
    OutOfMemory(#[from] AllocError),

    /// Array allocation was requested for a collectable type.
    #[error("array allocation is not supported for collectable types")]
    ArrayNewNotSupported,

    /// Array deallocation was requested for a collectable type.
    #[error("array deallocation is not supported for collectable types")]
    ArrayDeleteNotSupported,

    /// A singleton was constructed other than through its cell.
    #[error("singleton {type_name} constructed outside its sanctioned access point")]
    SingletonMisuse {
        /// Name of the singleton type.
        type_name: &'static str,
    },
}

impl GcError {
    /// True for resource exhaustion, as opposed to misuse.
    pub fn is_out_of_memory(&self) -> bool {
        matches!(self, GcError::OutOfMemory(_))
    }

    /// True for the array "not supported" errors.
    pub fn is_not_supported(&self) -> bool {
        matches!(
            self,
            GcError::ArrayNewNotSupported | GcError::ArrayDeleteNotSupported
        )
    }
}

/// Result type for gateway operations.
pub type GcResult<T> = Result<T, GcError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            GcError::from(AllocError::new(64)).to_string(),
            "out of memory: unable to allocate 64 bytes"
        );
        assert_eq!(
            GcError::ArrayNewNotSupported.to_string(),
            "array allocation is not supported for collectable types"
        );
        assert_eq!(
            GcError::ArrayDeleteNotSupported.to_string(),
            "array deallocation is not supported for collectable types"
        );
        assert!(GcError::SingletonMisuse { type_name: "Registry" }
            .to_string()
            .contains("Registry"));
    }

    #[test]
    fn test_error_classification() {
        assert!(GcError::OutOfMemory(AllocError::new(1)).is_out_of_memory());
        assert!(!GcError::ArrayNewNotSupported.is_out_of_memory());
        assert!(GcError::ArrayNewNotSupported.is_not_supported());
        assert!(GcError::ArrayDeleteNotSupported.is_not_supported());
        assert!(!GcError::OutOfMemory(AllocError::new(1)).is_not_supported());
    }
}
