//! Public facade crate for `primesearch`.
//!
//! This crate intentionally contains no IO or transport-specific logic.
//! It re-exports the backend-agnostic types/traits from `primesearch-core`.

pub use primesearch_core::*;
