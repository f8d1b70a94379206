//! One conversation model, many generative-text backends.
//!
//! This crate re-exports [switchboard_core]; see its documentation for an overview.

pub use switchboard_core::*;
