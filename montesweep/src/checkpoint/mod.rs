//! Persisted sweep progress.
//!
//! A [`Checkpoint`] records completed combinations and the one in progress.
//! It is encoded by a [`CheckpointSerializer`] and written to a
//! [`CheckpointStore`] under a key owned by a single runner.

mod error;
mod file;
mod memory;
mod serializer;
mod snapshot;
mod store;

pub use error::CheckpointError;
pub use file::FileCheckpointStore;
pub(crate) use file::is_valid_key;
pub use memory::InMemoryCheckpointStore;
pub use serializer::{CheckpointSerializer, JsonSerializer};
pub use snapshot::{Checkpoint, PartialCombination, StoppingTerms, CHECKPOINT_VERSION};
pub use store::CheckpointStore;
