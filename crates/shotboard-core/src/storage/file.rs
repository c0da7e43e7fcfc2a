//! File-based state store.

use super::{BoxFuture, ChangeFeed, StateStore, StorageError, StorageResult};
use crate::project::ProjectsState;
use std::fs;
use std::path::{Path, PathBuf};
use tokio::sync::broadcast;

/// Name of the state file inside the default directory.
const STATE_FILE_NAME: &str = "state.json";

/// Stores the projects state as one JSON file.
pub struct FileStateStore {
    /// Path of the JSON file.
    path: PathBuf,
    feed: ChangeFeed,
}

impl FileStateStore {
    /// Create a store backed by `path`.
    ///
    /// Creates the parent directory if it doesn't exist. The file itself is
    /// created on first write.
    pub fn new(path: PathBuf) -> StorageResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| {
                    StorageError::Io(format!("Failed to create storage directory: {}", e))
                })?;
            }
        }
        Ok(Self {
            path,
            feed: ChangeFeed::new(),
        })
    }

    /// Create a store in the default location.
    ///
    /// On Unix: `~/.local/share/shotboard/state.json`
    /// On Windows: `%LOCALAPPDATA%\shotboard\state.json`
    pub fn default_location() -> StorageResult<Self> {
        let base = dirs::data_local_dir()
            .or_else(dirs::home_dir)
            .ok_or_else(|| StorageError::Io("Could not determine home directory".to_string()))?;

        Self::new(base.join("shotboard").join(STATE_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StateStore for FileStateStore {
    fn read(&self) -> BoxFuture<'_, StorageResult<ProjectsState>> {
        Box::pin(async move {
            if !self.path.exists() {
                return Ok(ProjectsState::new());
            }

            let json = fs::read_to_string(&self.path).map_err(|e| {
                StorageError::Io(format!("Failed to read {}: {}", self.path.display(), e))
            })?;

            serde_json::from_str(&json).map_err(|e| {
                StorageError::Serialization(format!(
                    "Failed to parse {}: {}",
                    self.path.display(),
                    e
                ))
            })
        })
    }

    fn write(&self, state: &ProjectsState) -> BoxFuture<'_, StorageResult<()>> {
        let json = match serde_json::to_string_pretty(state) {
            Ok(j) => j,
            Err(e) => {
                return Box::pin(async move { Err(StorageError::Serialization(e.to_string())) });
            }
        };
        let state = state.clone();

        Box::pin(async move {
            fs::write(&self.path, json).map_err(|e| {
                StorageError::Io(format!("Failed to write {}: {}", self.path.display(), e))
            })?;
            self.feed.publish(&state);
            Ok(())
        })
    }

    fn subscribe(&self) -> broadcast::Receiver<ProjectsState> {
        self.feed.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::Screenshot;
    use crate::testing::block_on;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_reads_empty_state() {
        let dir = tempdir().unwrap();
        let store = FileStateStore::new(dir.path().join("state.json")).unwrap();

        let state = block_on(store.read()).unwrap();
        assert!(state.projects.is_empty());
    }

    #[test]
    fn test_file_store_save_load() {
        let dir = tempdir().unwrap();
        let store = FileStateStore::new(dir.path().join("nested").join("state.json")).unwrap();

        let mut state = ProjectsState::new();
        state.current_project_id = Some("p".into());
        state
            .ensure_project("p")
            .screenshots
            .push(Screenshot::path_only("projects/p/a.png", Some("canvas-1".into())));

        block_on(store.write(&state)).unwrap();
        let loaded = block_on(store.read()).unwrap();

        assert_eq!(loaded, state);
        assert!(store.path().exists());
    }

    #[test]
    fn test_corrupt_file_is_serialization_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "{ not json").unwrap();
        let store = FileStateStore::new(path).unwrap();

        let result = block_on(store.read());
        assert!(matches!(result, Err(StorageError::Serialization(_))));
    }

    #[test]
    fn test_file_store_publishes_writes() {
        let dir = tempdir().unwrap();
        let store = FileStateStore::new(dir.path().join("state.json")).unwrap();
        let mut rx = store.subscribe();

        let mut state = ProjectsState::new();
        state.ensure_project("p");
        block_on(store.write(&state)).unwrap();

        assert!(rx.try_recv().unwrap().project("p").is_some());
    }
}
