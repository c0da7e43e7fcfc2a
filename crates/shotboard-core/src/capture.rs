//! Capture pipeline: capture a page and durably record it in a project.

use crate::error::{DeliveryError, PipelineError};
use crate::external::{CaptureSource, Delivered, FileDelivery};
use crate::handoff::SessionHandoff;
use crate::image::ImageRef;
use crate::paths;
use crate::project::{Project, ProjectsState, Screenshot};
use crate::storage::StateStore;
use chrono::Utc;
use std::sync::Arc;

/// Where a capture ended up.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureOutcome {
    /// Path in the external store the image was delivered to.
    pub path: String,
    pub project_id: String,
    pub canvas_id: String,
    /// The record as persisted.
    pub screenshot: Screenshot,
}

/// Orchestrates capture, delivery and recording of screenshots.
pub struct CapturePipeline {
    store: Arc<dyn StateStore>,
    source: Arc<dyn CaptureSource>,
    delivery: Arc<dyn FileDelivery>,
    /// Sanitized external-store root.
    root: String,
    handoff: Option<Arc<SessionHandoff>>,
}

impl CapturePipeline {
    /// Create a pipeline writing below `root`, which is sanitized here.
    pub fn new(
        store: Arc<dyn StateStore>,
        source: Arc<dyn CaptureSource>,
        delivery: Arc<dyn FileDelivery>,
        root: &str,
    ) -> Self {
        Self {
            store,
            source,
            delivery,
            root: paths::normalize_root(Some(root)),
            handoff: None,
        }
    }

    /// Park every capture in `handoff` for views opened afterwards.
    pub fn with_handoff(mut self, handoff: Arc<SessionHandoff>) -> Self {
        self.handoff = Some(handoff);
        self
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    /// Capture the active page into a project and canvas.
    ///
    /// The target project is the owner of `canvas_hint` if any, else
    /// `project_hint`, else the current project, else a new project that also
    /// becomes current. Without `canvas_hint` the capture gets a new canvas.
    pub async fn capture_and_store(
        &self,
        project_hint: Option<&str>,
        canvas_hint: Option<&str>,
    ) -> Result<CaptureOutcome, PipelineError> {
        let started = Utc::now();
        let snapshot = self.store.read().await?;
        let project_id = match resolve_project(&snapshot, project_hint, canvas_hint) {
            Some(id) => id,
            None => self.create_current_project(snapshot, paths::new_project_id(started)).await?,
        };

        let captured = self.source.capture().await?;
        let file_name = paths::screenshot_file_name(captured.page_title.as_deref(), started);
        let delivered = self.deliver(&captured.bytes, &project_id, &file_name).await?;
        let image = ImageRef::from_bytes(&captured.bytes);

        if let Some(handoff) = &self.handoff {
            handoff.stash(&project_id, &delivered.final_path, image.clone());
        }

        // Re-read: other writers may have committed since the first read.
        let mut state = self.store.read().await?;
        let project = state.project_entry(&project_id);
        let canvas_id = match canvas_hint {
            Some(canvas) => project.ensure_canvas(canvas),
            None => project.add_sequential_canvas(),
        };
        let screenshot = record_capture(
            project,
            &delivered.final_path,
            image,
            &canvas_id,
            captured.page_title,
            captured.page_url,
        );

        self.store.write(&state).await.map_err(|e| {
            log::warn!(
                "Captured {} but failed to record it: {}",
                delivered.final_path,
                e
            );
            PipelineError::Persist(e)
        })?;

        log::info!(
            "Captured {} into {}/{}",
            delivered.final_path,
            project_id,
            canvas_id
        );
        Ok(CaptureOutcome {
            path: delivered.final_path,
            project_id,
            canvas_id,
            screenshot,
        })
    }

    async fn create_current_project(
        &self,
        mut state: ProjectsState,
        project_id: String,
    ) -> Result<String, PipelineError> {
        state
            .projects
            .insert(project_id.clone(), Project::new(&project_id));
        state.current_project_id = Some(project_id.clone());
        self.store.write(&state).await?;
        log::info!("Created project {}", project_id);
        Ok(project_id)
    }

    /// Deliver below the project directory, falling back to the bare root.
    async fn deliver(
        &self,
        bytes: &[u8],
        project_id: &str,
        file_name: &str,
    ) -> Result<Delivered, DeliveryError> {
        let nested = paths::project_path(&self.root, project_id, file_name);
        match self.delivery.deliver(bytes, &nested).await {
            Ok(delivered) => Ok(delivered),
            Err(e) => {
                let flat = paths::flat_path(&self.root, file_name);
                log::warn!("{}; retrying at {}", e, flat);
                self.delivery.deliver(bytes, &flat).await
            }
        }
    }
}

/// Pick the project a capture goes to; `None` means a new project is needed.
pub fn resolve_project(
    state: &ProjectsState,
    project_hint: Option<&str>,
    canvas_hint: Option<&str>,
) -> Option<String> {
    if let Some(canvas) = canvas_hint {
        let preferred = [project_hint, state.current_project_id.as_deref()];
        if let Some(owner) = state.project_owning_canvas(canvas, &preferred) {
            return Some(owner.to_string());
        }
    }
    project_hint
        .map(str::to_string)
        .or_else(|| state.current_project_id.clone())
}

/// Add the capture to `project`, or complete the record a scan already made
/// for the same path.
fn record_capture(
    project: &mut Project,
    path: &str,
    image: ImageRef,
    canvas_id: &str,
    page_title: Option<String>,
    page_url: Option<String>,
) -> Screenshot {
    if let Some(existing) = project.screenshot_by_path_mut(path) {
        existing.hydrate(image);
        existing.canvas_id = Some(canvas_id.to_string());
        if existing.page_title.is_none() {
            existing.page_title = page_title;
        }
        if existing.page_url.is_none() {
            existing.page_url = page_url;
        }
        return existing.clone();
    }

    let screenshot = Screenshot::captured(path, image, Some(canvas_id.to_string()))
        .with_page(page_title, page_url);
    project.screenshots.push(screenshot.clone());
    screenshot
}
