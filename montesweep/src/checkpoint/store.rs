//! Checkpoint storage abstraction.

use async_trait::async_trait;

use super::error::CheckpointError;

/// Durable key/value storage for serialized checkpoints.
///
/// The runner owns its key exclusively: it reads it once at startup and
/// overwrites it as the sweep progresses. A `save` must replace the previous
/// value atomically, so an interrupted write never leaves a torn checkpoint.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Load the bytes stored under `key`.
    ///
    /// - `Ok(Some(bytes))`: a checkpoint exists
    /// - `Ok(None)`: nothing stored (fresh sweep)
    /// - `Err(_)`: the backend failed
    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>, CheckpointError>;

    /// Replace the bytes stored under `key`.
    async fn save(&self, key: &str, data: Vec<u8>) -> Result<(), CheckpointError>;

    /// Delete `key`. Removing a missing key is not an error.
    async fn remove(&self, key: &str) -> Result<(), CheckpointError>;
}
