//! Error taxonomy for networks and weight persistence
//!
//! Numerical and size errors are recoverable: callers on the hot path fall
//! back to a zero vector (or skip the update) and keep the population loop
//! running. Persistence errors are returned to the caller and never touch the
//! in-memory weights.

use thiserror::Error;

/// Errors raised by a policy network call
#[derive(Debug, Error, Clone, PartialEq)]
pub enum NetworkError {
    /// An input or target vector does not match the configured architecture
    #[error("{context}: expected length {expected}, got {actual}")]
    ShapeMismatch {
        /// Which call rejected the vector
        context: &'static str,
        /// Length the architecture requires
        expected: usize,
        /// Length that was supplied
        actual: usize,
    },

    /// `forward_value` was called on a network built without a critic
    #[error("value network disabled")]
    ValueNetworkDisabled,

    /// The requested architecture cannot be built
    #[error("invalid architecture: {0}")]
    InvalidArchitecture(String),
}

impl NetworkError {
    pub(crate) fn shape(context: &'static str, expected: usize, actual: usize) -> Self {
        Self::ShapeMismatch { context, expected, actual }
    }
}

/// Errors raised while saving or loading network weights
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// The file could not be opened, read or written
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The JSON document is malformed
    #[error("malformed json document: {0}")]
    Json(#[from] serde_json::Error),

    /// The binary document is malformed
    #[error("malformed binary document: {0}")]
    Bincode(#[from] bincode::Error),

    /// The declared architecture differs from the live network
    #[error("schema mismatch: network is {expected}, document declares {found}")]
    SchemaMismatch {
        /// Architecture of the network being loaded into
        expected: String,
        /// Architecture declared by the document
        found: String,
    },

    /// A layer's arrays disagree with its declared dimensions
    #[error("malformed layer '{layer}': {reason}")]
    MalformedLayer {
        /// Layer name as stored in the document
        layer: String,
        /// What was wrong with it
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_mismatch_message() {
        let err = NetworkError::shape("forward", 12, 7);
        assert_eq!(err.to_string(), "forward: expected length 12, got 7");
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: PersistenceError = io.into();
        assert!(matches!(err, PersistenceError::Io(_)));
    }
}
