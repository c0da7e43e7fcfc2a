//! Storage abstraction for the persisted projects state.
//!
//! The store holds one whole-state snapshot. Every mutation is a
//! read-modify-write of that snapshot and the last write wins; callers
//! should read as late as possible before writing.

mod file;
mod memory;

pub use file::FileStateStore;
pub use memory::MemoryStateStore;

use crate::project::ProjectsState;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;
use tokio::sync::broadcast;

/// Capacity of the change feed; slower subscribers skip snapshots.
const FEED_CAPACITY: usize = 16;

/// Storage errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error("Storage error: {0}")]
    Other(String),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Boxed future for async operations.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Trait for projects state backends.
pub trait StateStore: Send + Sync {
    /// Read the full current snapshot.
    fn read(&self) -> BoxFuture<'_, StorageResult<ProjectsState>>;

    /// Replace the snapshot. Subscribers see the new snapshot once it commits.
    fn write(&self, state: &ProjectsState) -> BoxFuture<'_, StorageResult<()>>;

    /// Subscribe to committed snapshots.
    fn subscribe(&self) -> broadcast::Receiver<ProjectsState>;
}

/// Read the latest snapshot, apply `f`, and write the result back.
pub async fn read_modify_write<F, R>(store: &dyn StateStore, f: F) -> StorageResult<R>
where
    F: FnOnce(&mut ProjectsState) -> R,
{
    let mut state = store.read().await?;
    let result = f(&mut state);
    store.write(&state).await?;
    Ok(result)
}

/// Fan-out of committed snapshots to subscribers.
pub(crate) struct ChangeFeed {
    tx: broadcast::Sender<ProjectsState>,
}

impl ChangeFeed {
    pub(crate) fn new() -> Self {
        let (tx, _) = broadcast::channel(FEED_CAPACITY);
        Self { tx }
    }

    pub(crate) fn publish(&self, state: &ProjectsState) {
        if self.tx.receiver_count() > 0 {
            // A send only fails when every receiver is gone.
            let _ = self.tx.send(state.clone());
        }
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<ProjectsState> {
        self.tx.subscribe()
    }
}
