//! Error types for tree construction.

use std::collections::TryReserveError;

use thiserror::Error;

/// Result type alias using [`TreeError`].
pub type Result<T> = std::result::Result<T, TreeError>;

/// Failures while growing the node arena or the tail buffer.
///
/// Lookups never fail: a missing key is reported as `None`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    #[error("node arena exhausted: {requested} nodes requested, limit is {limit}")]
    NodeCapacity { requested: usize, limit: usize },

    #[error("tail buffer exhausted: {requested} units requested, limit is {limit}")]
    TailCapacity { requested: usize, limit: usize },

    #[error("allocation failed: {0}")]
    Alloc(#[from] TryReserveError),
}
