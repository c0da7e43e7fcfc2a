//! Feeds persisted screenshots to a drawing surface.

use crate::external::RenderSurface;
use crate::handoff::SessionHandoff;
use crate::image::ImageRef;
use crate::project::{CanvasScope, ProjectsState, Screenshot};
use crate::storage::{StateStore, StorageResult};
use kurbo::{Point, Rect, Size};
use std::collections::HashSet;

/// Left edge of the mount column.
pub const MOUNT_X: f64 = 100.0;
/// Top of the first mounted image.
pub const MOUNT_TOP: f64 = 100.0;
/// Vertical distance between consecutive images.
pub const MOUNT_STRIDE: f64 = 490.0;
/// Size every image is mounted at.
pub const MOUNT_SIZE: Size = Size::new(800.0, 450.0);

/// Placement of the `slot`th mounted image.
pub fn slot_bounds(slot: usize) -> Rect {
    let origin = Point::new(MOUNT_X, MOUNT_TOP + MOUNT_STRIDE * slot as f64);
    Rect::from_origin_size(origin, MOUNT_SIZE)
}

/// Presents one project, optionally narrowed to one canvas.
#[derive(Debug, Clone)]
pub struct Presenter {
    scope: CanvasScope,
    mounted: HashSet<ImageRef>,
    next_slot: usize,
}

impl Presenter {
    pub fn new(project_id: impl Into<String>, canvas_id: Option<String>) -> Self {
        Self {
            scope: CanvasScope::new(project_id, canvas_id),
            mounted: HashSet::new(),
            next_slot: 0,
        }
    }

    pub fn scope(&self) -> &CanvasScope {
        &self.scope
    }

    /// Switch to another canvas of the same project; the surface starts over.
    pub fn select_canvas(&mut self, canvas_id: Option<String>) {
        if self.scope.canvas_id != canvas_id {
            self.scope.canvas_id = canvas_id;
            self.mounted.clear();
            self.next_slot = 0;
        }
    }

    pub fn mounted_count(&self) -> usize {
        self.mounted.len()
    }

    /// Screenshots in scope, in record order.
    pub fn visible_screenshots<'a>(&'a self, state: &'a ProjectsState) -> Vec<&'a Screenshot> {
        self.scope.screenshots(state).collect()
    }

    /// Mount every image in scope not yet mounted by this presenter.
    ///
    /// Returns the number of images mounted. Images the surface rejects are
    /// retried on the next call. Identities whose records are gone are
    /// forgotten, so an identical image recorded later is mounted again.
    pub fn mount_new(&mut self, state: &ProjectsState, surface: &dyn RenderSurface) -> usize {
        let recorded: HashSet<&ImageRef> = self.scope.screenshots(state).map(|shot| &shot.image).collect();
        self.mounted.retain(|image| recorded.contains(image));

        let mut count = 0;
        for shot in self.scope.screenshots(state) {
            if shot.is_path_only() || self.mounted.contains(&shot.image) {
                continue;
            }
            match surface.mount(&shot.image, slot_bounds(self.next_slot)) {
                Ok(()) => {
                    self.mounted.insert(shot.image.clone());
                    self.next_slot += 1;
                    count += 1;
                }
                Err(e) => log::warn!("Failed to mount {}: {}", shot.path, e),
            }
        }
        if count > 0 {
            log::debug!("Mounted {} image(s) for {}", count, self.scope.project_id);
        }
        count
    }

    /// Fill in the pixels of the record the last capture produced, if the
    /// scanner recorded it as path-only.
    pub async fn hydrate_from_handoff(&self, store: &dyn StateStore, handoff: &SessionHandoff) -> StorageResult<bool> {
        if handoff.peek(&self.scope.project_id).is_none() {
            return Ok(false);
        }
        let mut state = store.read().await?;
        if !handoff.hydrate(&mut state, &self.scope.project_id) {
            return Ok(false);
        }
        store.write(&state).await?;
        Ok(true)
    }

    /// Hydrate from the handoff, then mount what is new in the latest state.
    pub async fn refresh(
        &mut self,
        store: &dyn StateStore,
        surface: &dyn RenderSurface,
        handoff: Option<&SessionHandoff>,
    ) -> StorageResult<usize> {
        if let Some(handoff) = handoff {
            self.hydrate_from_handoff(store, handoff).await?;
        }
        let state = store.read().await?;
        Ok(self.mount_new(&state, surface))
    }
}
