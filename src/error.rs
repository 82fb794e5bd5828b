//! Error types for index-zoo.
//!
//! Only configuration problems are reported as errors. Misuse of the
//! build-once protocol (querying before `reorganize`, inserting after it,
//! inverted ranges) is a programming error and panics.

use thiserror::Error;

/// Result type alias using [`ZooError`].
pub type Result<T> = std::result::Result<T, ZooError>;

/// Errors that can occur while configuring tables and indexes.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ZooError {
    #[error("Invalid block capacity: {capacity} (must be between 1 and {max})")]
    InvalidBlockCapacity { capacity: u64, max: u64 },

    #[error("Invalid layer count: {num_layers} (must be a multiple of {step} and at most {max})")]
    InvalidLayerCount {
        num_layers: usize,
        step: usize,
        max: usize,
    },
}
