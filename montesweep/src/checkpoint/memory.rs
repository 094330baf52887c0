//! In-memory checkpoint storage for tests.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::error::CheckpointError;
use super::store::CheckpointStore;

/// Checkpoints kept in a `HashMap`; lost when the process exits.
#[derive(Debug, Default)]
pub struct InMemoryCheckpointStore {
    data: Mutex<HashMap<String, Vec<u8>>>,
}

impl InMemoryCheckpointStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub async fn len(&self) -> usize {
        self.data.lock().await.len()
    }

    /// Whether nothing is stored.
    pub async fn is_empty(&self) -> bool {
        self.data.lock().await.is_empty()
    }

    /// Stored keys, sorted.
    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<_> = self.data.lock().await.keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>, CheckpointError> {
        Ok(self.data.lock().await.get(key).cloned())
    }

    async fn save(&self, key: &str, data: Vec<u8>) -> Result<(), CheckpointError> {
        self.data.lock().await.insert(key.to_string(), data);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), CheckpointError> {
        self.data.lock().await.remove(key);
        Ok(())
    }
}
