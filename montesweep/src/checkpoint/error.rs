//! Checkpoint error types.

use thiserror::Error;

/// Errors raised while persisting or restoring sweep progress.
#[derive(Debug, Error)]
pub enum CheckpointError {
    /// Progress could not be encoded.
    #[error("Serialization failed: {0}")]
    SerializationFailed(String),

    /// Stored bytes could not be decoded.
    #[error("Deserialization failed: {0}")]
    DeserializationFailed(String),

    /// The storage backend failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The checkpoint was written by an incompatible format version.
    #[error("Unsupported checkpoint version {found} (expected {expected})")]
    UnsupportedVersion {
        /// Version stored in the checkpoint.
        found: u32,
        /// Version this build writes.
        expected: u32,
    },

    /// The key cannot be mapped onto the storage backend.
    #[error("Invalid checkpoint key: {0}")]
    InvalidKey(String),
}
