//! Error types for gribmanager.
//!
//! This module defines the error enum shared by every wrapper around the
//! decoding library, from handle lifecycle violations to grid geometry checks.

use thiserror::Error;

/// The main error type for gribmanager operations.
#[derive(Error, Debug)]
pub enum GribError {
    /// A native handle was used after it had been released
    #[error("{kind} already released")]
    ResourceReleased { kind: &'static str },

    /// A metadata key is absent, or an index lookup matched nothing
    #[error("Key not found: {message}")]
    KeyNotFound { message: String },

    /// A unique index lookup matched more than one message
    #[error("Ambiguous match: {message}")]
    AmbiguousMatch { message: String },

    /// An index lookup supplied the wrong number of values
    #[error("Index expects {expected} value(s), got {got}")]
    IndexArity { expected: usize, got: usize },

    /// An index was requested without any keys
    #[error("Index must contain at least one key")]
    EmptyIndexKeys,

    /// Regular grid parameters are inconsistent
    #[error("Grid geometry error: {message}")]
    GridGeometry { message: String },

    /// A query point falls outside the grid
    #[error("Point outside grid: lat={lat}, lon={lon}")]
    OutOfGrid { lat: f64, lon: f64 },

    /// Interpolation could not be carried out
    #[error("Interpolation error: {message}")]
    Interpolation { message: String },

    /// The descriptor routine and the decoding library disagree on nearest points
    #[error("Nearest point mismatch at lat={lat}, lon={lon}: grid={grid:?}, library={library:?}")]
    NearestPointMismatch {
        lat: f64,
        lon: f64,
        grid: Vec<usize>,
        library: Vec<usize>,
    },

    /// A key holds a value of a different type than required
    #[error("Unexpected type for key {key}: expected {expected}")]
    UnexpectedKeyType { key: String, expected: &'static str },

    /// The decoding library reported a failure
    #[error("Decoding error: {message}")]
    Decode { message: String },

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl GribError {
    /// Whether this error belongs to the key lookup family: an absent key,
    /// an empty or ambiguous index match, or a lookup of the wrong arity.
    pub fn is_key_error(&self) -> bool {
        matches!(
            self,
            GribError::KeyNotFound { .. }
                | GribError::AmbiguousMatch { .. }
                | GribError::IndexArity { .. }
        )
    }

    pub(crate) fn decode(message: impl Into<String>) -> Self {
        GribError::Decode {
            message: message.into(),
        }
    }
}

/// Convenience type alias for Results with GribError
pub type Result<T> = std::result::Result<T, GribError>;
