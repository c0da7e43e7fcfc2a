//! In-memory state store.

use super::{BoxFuture, ChangeFeed, StateStore, StorageError, StorageResult};
use crate::project::ProjectsState;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::broadcast;

/// In-memory store for testing and ephemeral use.
pub struct MemoryStateStore {
    state: RwLock<ProjectsState>,
    feed: ChangeFeed,
    writes: AtomicUsize,
    fail_writes: AtomicBool,
}

impl Default for MemoryStateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStateStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::with_state(ProjectsState::new())
    }

    /// Create a store seeded with `state`.
    pub fn with_state(state: ProjectsState) -> Self {
        Self {
            state: RwLock::new(state),
            feed: ChangeFeed::new(),
            writes: AtomicUsize::new(0),
            fail_writes: AtomicBool::new(false),
        }
    }

    /// Number of committed writes.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Make subsequent writes fail (or succeed again).
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Copy of the current snapshot without going through the async API.
    pub fn snapshot(&self) -> StorageResult<ProjectsState> {
        self.state
            .read()
            .map(|state| state.clone())
            .map_err(|e| StorageError::Other(format!("Lock error: {}", e)))
    }
}

impl StateStore for MemoryStateStore {
    fn read(&self) -> BoxFuture<'_, StorageResult<ProjectsState>> {
        Box::pin(async move { self.snapshot() })
    }

    fn write(&self, state: &ProjectsState) -> BoxFuture<'_, StorageResult<()>> {
        let state = state.clone();
        Box::pin(async move {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(StorageError::Io("Simulated write failure".to_string()));
            }
            {
                let mut current = self.state.write().map_err(|e| {
                    StorageError::Other(format!("Lock error: {}", e))
                })?;
                *current = state.clone();
            }
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.feed.publish(&state);
            Ok(())
        })
    }

    fn subscribe(&self) -> broadcast::Receiver<ProjectsState> {
        self.feed.subscribe()
    }
}
