//! Explicit project and canvas management.

use crate::error::LibraryError;
use crate::paths;
use crate::project::{OrphanPolicy, Project, ProjectsState, RemovedCanvas};
use crate::storage::{StateStore, read_modify_write};
use chrono::Utc;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Project ids known to the store or discovered in the external store, sorted.
pub fn list_projects<'a>(state: &'a ProjectsState, discovered: impl IntoIterator<Item = &'a String>) -> Vec<String> {
    state
        .projects
        .keys()
        .chain(discovered)
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// User-facing operations on projects and canvases.
pub struct ProjectLibrary {
    store: Arc<dyn StateStore>,
}

impl ProjectLibrary {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self { store }
    }

    /// Create a fresh project with the default canvas and make it current.
    pub async fn new_project(&self) -> Result<String, LibraryError> {
        let id = paths::new_project_id(Utc::now());
        read_modify_write(self.store.as_ref(), |state| {
            state
                .projects
                .insert(id.clone(), Project::with_default_canvas(&id));
            state.current_project_id = Some(id.clone());
        })
        .await?;
        log::info!("Created project {}", id);
        Ok(id)
    }

    /// Make `project_id` current, creating it if needed.
    ///
    /// Returns the id of the canvas to show first.
    pub async fn open_project(&self, project_id: &str) -> Result<String, LibraryError> {
        let canvas_id = read_modify_write(self.store.as_ref(), |state| {
            let project = state.ensure_project(project_id);
            let canvas_id = project.ensure_default_canvas();
            state.current_project_id = Some(project_id.to_string());
            canvas_id
        })
        .await?;
        log::debug!("Opened project {} at {}", project_id, canvas_id);
        Ok(canvas_id)
    }

    /// Make sure the project has the named canvas, or any canvas for `None`.
    pub async fn ensure_canvas(&self, project_id: &str, canvas_id: Option<&str>) -> Result<String, LibraryError> {
        let mut state = self.store.read().await?;
        let project = state
            .project_mut(project_id)
            .ok_or_else(|| LibraryError::ProjectNotFound(project_id.to_string()))?;
        let before = project.canvases.len();
        let id = match canvas_id {
            Some(id) => project.ensure_canvas(id),
            None => project.ensure_default_canvas(),
        };
        if project.canvases.len() != before {
            self.store.write(&state).await?;
        }
        Ok(id)
    }

    /// Delete a canvas, applying `policy` to its screenshots.
    pub async fn delete_canvas(
        &self,
        project_id: &str,
        canvas_id: &str,
        policy: OrphanPolicy,
    ) -> Result<RemovedCanvas, LibraryError> {
        let mut state = self.store.read().await?;
        let project = state
            .project_mut(project_id)
            .ok_or_else(|| LibraryError::ProjectNotFound(project_id.to_string()))?;
        let removed = project
            .remove_canvas(canvas_id, policy)
            .ok_or_else(|| LibraryError::CanvasNotFound(canvas_id.to_string()))?;
        self.store.write(&state).await?;

        log::info!(
            "Deleted canvas {} of {} ({} screenshot(s) removed, {} reassigned)",
            canvas_id,
            project_id,
            removed.removed.len(),
            removed.reassigned
        );
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::{DEFAULT_CANVAS_ID, Screenshot};
    use crate::storage::MemoryStateStore;
    use crate::testing::block_on;

    fn library() -> (Arc<MemoryStateStore>, ProjectLibrary) {
        let store = Arc::new(MemoryStateStore::new());
        (store.clone(), ProjectLibrary::new(store))
    }

    #[test]
    fn test_new_project_becomes_current() {
        let (store, library) = library();
        let id = block_on(library.new_project()).unwrap();

        let state = store.snapshot().unwrap();
        assert!(id.starts_with(paths::PROJECT_ID_PREFIX));
        assert_eq!(state.current_project_id.as_deref(), Some(id.as_str()));
        assert_eq!(state.project(&id).unwrap().first_canvas_id(), Some(DEFAULT_CANVAS_ID));
    }

    #[test]
    fn test_open_project_creates_missing() {
        let (store, library) = library();
        assert_eq!(block_on(library.open_project("demo")).unwrap(), DEFAULT_CANVAS_ID);

        let state = store.snapshot().unwrap();
        assert_eq!(state.current_project_id.as_deref(), Some("demo"));
        assert_eq!(state.project("demo").unwrap().canvases.len(), 1);
    }

    #[test]
    fn test_ensure_canvas_writes_only_on_change() {
        let (store, library) = library();
        block_on(library.open_project("demo")).unwrap();
        let writes = store.write_count();

        assert_eq!(block_on(library.ensure_canvas("demo", None)).unwrap(), DEFAULT_CANVAS_ID);
        assert_eq!(store.write_count(), writes);

        assert_eq!(block_on(library.ensure_canvas("demo", Some("canvas-5"))).unwrap(), "canvas-5");
        assert_eq!(store.write_count(), writes + 1);
        let state = store.snapshot().unwrap();
        assert_eq!(state.project("demo").unwrap().canvas("canvas-5").unwrap().name, "Canvas 5");
    }

    #[test]
    fn test_delete_canvas_removes_its_screenshots() {
        let (store, library) = library();
        block_on(library.open_project("demo")).unwrap();
        block_on(library.ensure_canvas("demo", Some("canvas-2"))).unwrap();
        let mut state = store.snapshot().unwrap();
        let project = state.project_mut("demo").unwrap();
        project.screenshots.push(Screenshot::path_only("projects/demo/a.png", Some("canvas-2".into())));
        project.screenshots.push(Screenshot::path_only("projects/demo/b.png", Some("canvas-1".into())));
        block_on(store.write(&state)).unwrap();

        let removed = block_on(library.delete_canvas("demo", "canvas-2", OrphanPolicy::default())).unwrap();

        assert_eq!(removed.removed.len(), 1);
        let state = store.snapshot().unwrap();
        let project = state.project("demo").unwrap();
        assert_eq!(project.screenshots.len(), 1);
        assert!(project.canvas("canvas-2").is_none());
    }

    #[test]
    fn test_unknown_targets_are_reported() {
        let (_store, library) = library();
        block_on(library.open_project("demo")).unwrap();

        assert!(matches!(
            block_on(library.delete_canvas("nope", "canvas-1", OrphanPolicy::default())),
            Err(LibraryError::ProjectNotFound(_))
        ));
        assert!(matches!(
            block_on(library.delete_canvas("demo", "canvas-9", OrphanPolicy::default())),
            Err(LibraryError::CanvasNotFound(_))
        ));
        assert!(matches!(
            block_on(library.ensure_canvas("nope", None)),
            Err(LibraryError::ProjectNotFound(_))
        ));
    }

    #[test]
    fn test_list_projects_merges_sources() {
        let mut state = ProjectsState::new();
        state.ensure_project("b");
        state.ensure_project("a");
        let discovered = BTreeSet::from(["c".to_string(), "a".to_string()]);

        assert_eq!(list_projects(&state, &discovered), vec!["a", "b", "c"]);
    }
}
