//! Deletion reconciliation between a live surface and persisted state.
//!
//! An image is only treated as deleted by the user once it has been seen on
//! the surface and is then gone. Images still being mounted were never seen,
//! so they are never deleted.

use crate::external::RenderSurface;
use crate::image::ImageRef;
use crate::project::{CanvasScope, ProjectsState};
use crate::storage::{StateStore, StorageResult};
use std::collections::HashSet;

/// What one poll did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollReport {
    /// Identities confirmed deleted during this poll.
    pub confirmed: HashSet<ImageRef>,
    /// Number of screenshot records removed.
    pub removed: usize,
}

/// Tracks one scope of one surface across polls.
#[derive(Debug, Clone)]
pub struct DeletionReconciler {
    scope: CanvasScope,
    ever_seen: HashSet<ImageRef>,
}

impl DeletionReconciler {
    pub fn new(scope: CanvasScope) -> Self {
        Self {
            scope,
            ever_seen: HashSet::new(),
        }
    }

    pub fn scope(&self) -> &CanvasScope {
        &self.scope
    }

    /// Point the reconciler at another scope. Observations are discarded.
    pub fn set_scope(&mut self, scope: CanvasScope) {
        if scope != self.scope {
            self.scope = scope;
            self.ever_seen.clear();
        }
    }

    pub fn has_seen(&self, image: &ImageRef) -> bool {
        self.ever_seen.contains(image)
    }

    /// Record identities present on the surface.
    pub fn observe(&mut self, present: &HashSet<ImageRef>) {
        self.ever_seen.extend(present.iter().cloned());
    }

    /// Expected identities that were seen once and are no longer present.
    pub fn confirmed_deletions(&self, state: &ProjectsState, present: &HashSet<ImageRef>) -> HashSet<ImageRef> {
        self.scope
            .screenshots(state)
            .map(|shot| &shot.image)
            .filter(|image| !image.is_empty())
            .filter(|image| self.ever_seen.contains(*image) && !present.contains(*image))
            .cloned()
            .collect()
    }

    /// Observe the surface and delete the records of images removed from it.
    ///
    /// The store is written only when something was confirmed deleted.
    pub async fn poll(&mut self, surface: &dyn RenderSurface, store: &dyn StateStore) -> StorageResult<PollReport> {
        let present = surface.present_identities();
        self.observe(&present);

        let mut state = store.read().await?;
        let confirmed = self.confirmed_deletions(&state, &present);
        if confirmed.is_empty() {
            return Ok(PollReport::default());
        }

        let removed = match state.project_mut(&self.scope.project_id) {
            Some(project) => {
                let before = project.screenshots.len();
                let scope = &self.scope;
                project
                    .screenshots
                    .retain(|shot| !(scope.contains(shot) && confirmed.contains(&shot.image)));
                before - project.screenshots.len()
            }
            None => 0,
        };
        store.write(&state).await?;

        for image in &confirmed {
            log::debug!("Confirmed deletion of {}", image.abbreviated());
            self.ever_seen.remove(image);
        }
        log::info!(
            "Removed {} screenshot(s) deleted from {}",
            removed,
            self.scope.project_id
        );
        Ok(PollReport { confirmed, removed })
    }
}
