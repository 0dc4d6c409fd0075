//! Process-wide state.

pub(crate) mod global;
