//! Checkpoint encoding.

use serde::{Deserialize, Serialize};

use super::error::CheckpointError;

/// Encodes checkpoints and exported results to bytes and back.
pub trait CheckpointSerializer {
    /// Encode `value`.
    fn serialize<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, CheckpointError>;

    /// Decode a value previously written by [`serialize`](Self::serialize).
    fn deserialize<T: for<'de> Deserialize<'de>>(&self, data: &[u8])
        -> Result<T, CheckpointError>;
}

/// Pretty-printed JSON via serde_json.
///
/// Floats round-trip exactly, so a restored result set continues with the
/// same bits it was saved with.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer;

impl JsonSerializer {
    /// Create a JSON serializer.
    pub fn new() -> Self {
        Self
    }
}

impl CheckpointSerializer for JsonSerializer {
    fn serialize<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, CheckpointError> {
        serde_json::to_vec_pretty(value)
            .map_err(|e| CheckpointError::SerializationFailed(format!("JSON error: {}", e)))
    }

    fn deserialize<T: for<'de> Deserialize<'de>>(
        &self,
        data: &[u8],
    ) -> Result<T, CheckpointError> {
        serde_json::from_slice(data)
            .map_err(|e| CheckpointError::DeserializationFailed(format!("JSON error: {}", e)))
    }
}
