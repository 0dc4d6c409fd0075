//! Marker for types that must not be duplicated.

/// Zero-sized marker with no `Clone` or `Copy`.
///
/// Embedding it in a struct keeps `#[derive(Clone)]` from compiling, so the
/// owning type can only be moved.
///
/// ```rust,compile_fail
/// use gcgate::NonCopyable;
///
/// #[derive(Clone)]
/// struct Unique {
///     _marker: NonCopyable,
/// }
/// ```
#[derive(Debug, Default, PartialEq, Eq, Hash)]
pub struct NonCopyable {
    _private: (),
}

impl NonCopyable {
    /// Create the marker.
    pub const fn new() -> Self {
        Self { _private: () }
    }
}
