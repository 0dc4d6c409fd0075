//! Public API for gcgate.
//!
//! This module contains all user-facing types and functions.
//! Most users should only interact with types from this module.

#[cfg(feature = "nightly")]
pub mod allocator_impl;
pub mod collectable;
pub mod config;
pub mod error;
pub mod gateway;
pub mod handler;
pub mod noncopyable;
pub mod operators;
pub mod pointers;
pub mod scope;
pub mod singleton;
pub mod stats;
pub mod wrappers;
