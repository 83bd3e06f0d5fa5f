//! Error types for the ivfserve library.
//!
//! All fallible operations return [`Result`], whose error side is the
//! [`IvfServeError`] enum. The variants mirror how a caller is expected to
//! react: input errors (`DimensionMismatch`, `InvalidArgument`) are surfaced
//! immediately, persistence errors (`CorruptFormat`, `Io`) stop a process
//! from serving, and `DeadlineExceeded` is the only retryable failure.
//!
//! # Examples
//!
//! ```
//! use ivfserve::error::{IvfServeError, Result};
//!
//! fn pick_k(k: usize) -> Result<usize> {
//!     if k == 0 {
//!         return Err(IvfServeError::invalid_argument("k must be at least 1"));
//!     }
//!     Ok(k)
//! }
//!
//! assert!(pick_k(0).is_err());
//! assert_eq!(pick_k(3).unwrap(), 3);
//! ```

use std::io;

use thiserror::Error;

/// The main error type for ivfserve operations.
#[derive(Error, Debug)]
pub enum IvfServeError {
    /// A vector did not have the dimension of the index it was used with.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Bad `k`, `nprobe` or configuration value.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Lookup of a vector id that does not exist in the store.
    #[error("Vector id {id} out of range (store size {size})")]
    OutOfRange { id: u64, size: usize },

    /// Persisted index failed validation.
    #[error("Corrupt index file: {0}")]
    CorruptFormat(String),

    /// I/O errors (file operations).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Cooperative cancellation: the query ran past its deadline.
    #[error("Deadline exceeded after {elapsed_ms} ms")]
    DeadlineExceeded { elapsed_ms: u64 },

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Errors reported by an external collaborator such as the text embedder.
    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

/// Result type alias for operations that may fail with IvfServeError.
pub type Result<T> = std::result::Result<T, IvfServeError>;

impl IvfServeError {
    /// Create a new dimension mismatch error.
    pub fn dimension_mismatch(expected: usize, actual: usize) -> Self {
        IvfServeError::DimensionMismatch { expected, actual }
    }

    /// Create a new invalid argument error.
    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        IvfServeError::InvalidArgument(msg.into())
    }

    /// Create a new corrupt format error.
    pub fn corrupt_format<S: Into<String>>(msg: S) -> Self {
        IvfServeError::CorruptFormat(msg.into())
    }

    /// Create a new out of range error.
    pub fn out_of_range(id: u64, size: usize) -> Self {
        IvfServeError::OutOfRange { id, size }
    }

    /// Whether the same call may succeed if retried unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, IvfServeError::DeadlineExceeded { .. })
    }
}
