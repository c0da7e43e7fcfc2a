//! Projects, canvases and screenshot records.

use crate::image::ImageRef;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Id of the canvas every project gets when it needs one.
pub const DEFAULT_CANVAS_ID: &str = "canvas-1";

/// The persisted record: every project plus the current project pointer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectsState {
    /// Default target for captures that name no project.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_project_id: Option<String>,
    /// All projects, keyed by id.
    #[serde(default)]
    pub projects: BTreeMap<String, Project>,
}

impl ProjectsState {
    /// Create an empty state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a project by ID.
    pub fn project(&self, id: &str) -> Option<&Project> {
        self.projects.get(id)
    }

    /// Get a mutable project by ID.
    pub fn project_mut(&mut self, id: &str) -> Option<&mut Project> {
        self.projects.get_mut(id)
    }

    pub fn current_project(&self) -> Option<&Project> {
        self.current_project_id
            .as_deref()
            .and_then(|id| self.project(id))
    }

    /// Get a project, inserting an empty one (no canvases) when missing.
    pub fn project_entry(&mut self, id: &str) -> &mut Project {
        self.projects
            .entry(id.to_string())
            .or_insert_with(|| Project::new(id))
    }

    /// Get a project, inserting one with the default canvas when missing.
    pub fn ensure_project(&mut self, id: &str) -> &mut Project {
        self.projects
            .entry(id.to_string())
            .or_insert_with(|| Project::with_default_canvas(id))
    }

    /// Find the project that owns `canvas_id`.
    ///
    /// Canvas ids are only unique within a project, so the `preferred`
    /// projects are tried first, then every project in id order.
    pub fn project_owning_canvas(&self, canvas_id: &str, preferred: &[Option<&str>]) -> Option<&str> {
        let owns = |project: &Project| project.canvas(canvas_id).is_some();

        preferred
            .iter()
            .flatten()
            .filter_map(|id| self.project(id))
            .chain(self.projects.values())
            .find(|project| owns(project))
            .map(|project| project.id.as_str())
    }

    /// Total number of screenshot records across projects.
    pub fn screenshot_count(&self) -> usize {
        self.projects.values().map(|p| p.screenshots.len()).sum()
    }
}

/// A named grouping of canvases and captured screenshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub canvases: Vec<Canvas>,
    #[serde(default)]
    pub screenshots: Vec<Screenshot>,
}

impl Project {
    /// Create a project with no canvases.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: None,
            created_at: Utc::now(),
            canvases: Vec::new(),
            screenshots: Vec::new(),
        }
    }

    /// Create a project holding the default canvas.
    pub fn with_default_canvas(id: impl Into<String>) -> Self {
        let mut project = Self::new(id);
        project.canvases.push(Canvas::from_id(DEFAULT_CANVAS_ID));
        project
    }

    /// Get a canvas by ID.
    pub fn canvas(&self, id: &str) -> Option<&Canvas> {
        self.canvases.iter().find(|c| c.id == id)
    }

    pub fn first_canvas_id(&self) -> Option<&str> {
        self.canvases.first().map(|c| c.id.as_str())
    }

    /// Make sure a canvas with `id` exists, naming it after the id if created.
    pub fn ensure_canvas(&mut self, id: &str) -> String {
        if self.canvas(id).is_none() {
            self.canvases.push(Canvas::from_id(id));
        }
        id.to_string()
    }

    /// First canvas id, creating the default canvas when there is none.
    pub fn ensure_default_canvas(&mut self) -> String {
        match self.first_canvas_id() {
            Some(id) => id.to_string(),
            None => self.ensure_canvas(DEFAULT_CANVAS_ID),
        }
    }

    /// Append a new canvas named `Canvas N` with the next free number.
    pub fn add_sequential_canvas(&mut self) -> String {
        let mut n = self.canvases.len() + 1;
        while self.canvas(&format!("canvas-{}", n)).is_some() {
            n += 1;
        }
        let canvas = Canvas::new(format!("canvas-{}", n), format!("Canvas {}", n));
        let id = canvas.id.clone();
        self.canvases.push(canvas);
        id
    }

    pub fn screenshot_by_path(&self, path: &str) -> Option<&Screenshot> {
        self.screenshots.iter().find(|s| s.path == path)
    }

    pub fn screenshot_by_path_mut(&mut self, path: &str) -> Option<&mut Screenshot> {
        self.screenshots.iter_mut().find(|s| s.path == path)
    }

    pub fn has_path(&self, path: &str) -> bool {
        self.screenshot_by_path(path).is_some()
    }

    /// Screenshots assigned to `canvas_id`, or all of them for `None`.
    pub fn screenshots_on<'a>(&'a self, canvas_id: Option<&'a str>) -> impl Iterator<Item = &'a Screenshot> + 'a {
        self.screenshots
            .iter()
            .filter(move |s| canvas_id.is_none() || s.canvas_id.as_deref() == canvas_id)
    }

    /// Remove a canvas, applying `policy` to the screenshots assigned to it.
    ///
    /// Returns `None` when the canvas does not exist.
    pub fn remove_canvas(&mut self, canvas_id: &str, policy: OrphanPolicy) -> Option<RemovedCanvas> {
        let index = self.canvases.iter().position(|c| c.id == canvas_id)?;
        let canvas = self.canvases.remove(index);
        let is_orphan = |s: &Screenshot| s.canvas_id.as_deref() == Some(canvas_id);

        let (removed, reassigned) = match policy {
            OrphanPolicy::DeleteScreenshots => {
                let (orphans, kept): (Vec<Screenshot>, Vec<Screenshot>) =
                    std::mem::take(&mut self.screenshots)
                        .into_iter()
                        .partition(|s| is_orphan(s));
                self.screenshots = kept;
                (orphans, 0)
            }
            OrphanPolicy::ReassignToFirst => {
                let mut reassigned = 0;
                if self.screenshots.iter().any(|s| is_orphan(s)) {
                    let target = self.ensure_default_canvas();
                    for shot in self.screenshots.iter_mut().filter(|s| is_orphan(s)) {
                        shot.canvas_id = Some(target.clone());
                        reassigned += 1;
                    }
                }
                (Vec::new(), reassigned)
            }
            OrphanPolicy::Retain => (Vec::new(), 0),
        };

        Some(RemovedCanvas {
            canvas,
            removed,
            reassigned,
        })
    }
}

/// A named surface within a project that screenshots are assigned to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Canvas {
    pub id: String,
    pub name: String,
}

impl Canvas {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }

    /// Create a canvas named after its id: `canvas-2` becomes `Canvas 2`.
    pub fn from_id(id: &str) -> Self {
        let spaced = id.replace('-', " ");
        let mut chars = spaced.chars();
        let name = match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        };
        Self::new(id, name)
    }
}

/// Persisted metadata, and optionally pixel data, for one captured image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Screenshot {
    pub id: String,
    /// Pixel data; empty for path-only records.
    #[serde(default, skip_serializing_if = "ImageRef::is_empty")]
    pub image: ImageRef,
    /// Relative path in the external store.
    pub path: String,
    pub created_at: DateTime<Utc>,
    /// Non-owning reference to the canvas this screenshot is placed on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canvas_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_url: Option<String>,
}

impl Screenshot {
    /// A record for a freshly captured image.
    pub fn captured(path: impl Into<String>, image: ImageRef, canvas_id: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            image,
            path: path.into(),
            created_at: Utc::now(),
            canvas_id,
            page_title: None,
            page_url: None,
        }
    }

    /// A record for a file discovered in the external store.
    pub fn path_only(path: impl Into<String>, canvas_id: Option<String>) -> Self {
        Self::captured(path, ImageRef::empty(), canvas_id)
    }

    pub fn with_page(mut self, title: Option<String>, url: Option<String>) -> Self {
        self.page_title = title;
        self.page_url = url;
        self
    }

    pub fn is_path_only(&self) -> bool {
        self.image.is_empty()
    }

    /// Fill in the pixel data of a path-only record.
    ///
    /// Returns false, leaving the record untouched, if it already has pixels.
    pub fn hydrate(&mut self, image: ImageRef) -> bool {
        if !self.is_path_only() || image.is_empty() {
            return false;
        }
        self.image = image;
        true
    }
}

/// What happens to screenshots whose canvas is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OrphanPolicy {
    /// Delete them along with the canvas.
    #[default]
    DeleteScreenshots,
    /// Move them to the first remaining canvas.
    ReassignToFirst,
    /// Keep them with a dangling canvas reference.
    Retain,
}

/// Result of removing a canvas.
#[derive(Debug, Clone, PartialEq)]
pub struct RemovedCanvas {
    pub canvas: Canvas,
    /// Screenshots deleted with the canvas.
    pub removed: Vec<Screenshot>,
    /// Number of screenshots moved to another canvas.
    pub reassigned: usize,
}

/// The screenshots of one project, optionally narrowed to one canvas.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanvasScope {
    pub project_id: String,
    pub canvas_id: Option<String>,
}

impl CanvasScope {
    pub fn new(project_id: impl Into<String>, canvas_id: Option<String>) -> Self {
        Self {
            project_id: project_id.into(),
            canvas_id,
        }
    }

    /// Screenshots in scope, in record order.
    pub fn screenshots<'a>(&'a self, state: &'a ProjectsState) -> impl Iterator<Item = &'a Screenshot> + 'a {
        state
            .project(&self.project_id)
            .into_iter()
            .flat_map(move |p| p.screenshots_on(self.canvas_id.as_deref()))
    }

    pub fn contains(&self, shot: &Screenshot) -> bool {
        self.canvas_id.is_none() || shot.canvas_id == self.canvas_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project_with_shots() -> Project {
        let mut project = Project::with_default_canvas("p");
        project.ensure_canvas("canvas-2");
        project.screenshots.push(Screenshot::path_only("projects/p/a.png", Some("canvas-1".into())));
        project.screenshots.push(Screenshot::path_only("projects/p/b.png", Some("canvas-2".into())));
        project.screenshots.push(Screenshot::path_only("projects/p/c.png", Some("canvas-2".into())));
        project
    }

    #[test]
    fn test_canvas_name_from_id() {
        assert_eq!(Canvas::from_id("canvas-2").name, "Canvas 2");
        assert_eq!(Canvas::from_id("my-board").name, "My board");
        assert_eq!(Canvas::from_id("").name, "");
    }

    #[test]
    fn test_ensure_canvas_is_idempotent() {
        let mut project = Project::new("p");
        project.ensure_canvas("canvas-3");
        project.ensure_canvas("canvas-3");
        assert_eq!(project.canvases.len(), 1);
        assert_eq!(project.canvases[0].name, "Canvas 3");
    }

    #[test]
    fn test_sequential_canvas_skips_taken_ids() {
        let mut project = Project::new("p");
        assert_eq!(project.add_sequential_canvas(), "canvas-1");
        project.ensure_canvas("canvas-3");
        // Two canvases exist, canvas-3 is taken, so the next free number is 4.
        assert_eq!(project.add_sequential_canvas(), "canvas-4");
        assert_eq!(project.canvas("canvas-4").unwrap().name, "Canvas 4");
    }

    #[test]
    fn test_ensure_default_canvas() {
        let mut empty = Project::new("p");
        assert_eq!(empty.ensure_default_canvas(), DEFAULT_CANVAS_ID);
        assert_eq!(empty.canvases.len(), 1);

        let mut named = Project::new("q");
        named.ensure_canvas("notes");
        assert_eq!(named.ensure_default_canvas(), "notes");
    }

    #[test]
    fn test_remove_canvas_deletes_orphans() {
        let mut project = project_with_shots();
        let removed = project.remove_canvas("canvas-2", OrphanPolicy::DeleteScreenshots).unwrap();

        assert_eq!(removed.removed.len(), 2);
        assert_eq!(project.screenshots.len(), 1);
        assert_eq!(project.canvases.len(), 1);
    }

    #[test]
    fn test_remove_canvas_reassigns_orphans() {
        let mut project = project_with_shots();
        let removed = project.remove_canvas("canvas-2", OrphanPolicy::ReassignToFirst).unwrap();

        assert_eq!(removed.reassigned, 2);
        assert!(removed.removed.is_empty());
        assert!(project.screenshots.iter().all(|s| s.canvas_id.as_deref() == Some("canvas-1")));
    }

    #[test]
    fn test_remove_last_canvas_reassigns_to_new_default() {
        let mut project = Project::new("p");
        project.ensure_canvas("only");
        project.screenshots.push(Screenshot::path_only("projects/p/a.png", Some("only".into())));

        project.remove_canvas("only", OrphanPolicy::ReassignToFirst).unwrap();

        assert_eq!(project.first_canvas_id(), Some(DEFAULT_CANVAS_ID));
        assert_eq!(project.screenshots[0].canvas_id.as_deref(), Some(DEFAULT_CANVAS_ID));
    }

    #[test]
    fn test_remove_canvas_retains_orphans() {
        let mut project = project_with_shots();
        project.remove_canvas("canvas-2", OrphanPolicy::Retain).unwrap();

        assert_eq!(project.screenshots.len(), 3);
        assert_eq!(project.screenshots_on(Some("canvas-2")).count(), 2);
        assert!(project.canvas("canvas-2").is_none());
    }

    #[test]
    fn test_remove_missing_canvas() {
        let mut project = project_with_shots();
        assert!(project.remove_canvas("nope", OrphanPolicy::default()).is_none());
        assert_eq!(project.screenshots.len(), 3);
    }

    #[test]
    fn test_hydrate_only_fills_path_only_records() {
        let mut shot = Screenshot::path_only("projects/p/a.png", None);
        assert!(shot.is_path_only());
        assert!(!shot.hydrate(ImageRef::empty()));
        assert!(shot.hydrate(ImageRef::from_raw("data:image/png;base64,AAAA")));
        assert!(!shot.hydrate(ImageRef::from_raw("data:image/png;base64,BBBB")));
        assert_eq!(shot.image.as_str(), "data:image/png;base64,AAAA");
    }

    #[test]
    fn test_project_owning_canvas_prefers_hints() {
        let mut state = ProjectsState::new();
        state.ensure_project("a");
        state.ensure_project("b");

        assert_eq!(state.project_owning_canvas("canvas-1", &[]), Some("a"));
        assert_eq!(state.project_owning_canvas("canvas-1", &[None, Some("b")]), Some("b"));
        assert_eq!(state.project_owning_canvas("canvas-1", &[Some("missing"), Some("b")]), Some("b"));
        assert_eq!(state.project_owning_canvas("canvas-9", &[Some("a")]), None);
    }

    #[test]
    fn test_scope_filters_by_canvas() {
        let mut state = ProjectsState::new();
        state.projects.insert("p".into(), project_with_shots());

        assert_eq!(CanvasScope::new("p", None).screenshots(&state).count(), 3);
        assert_eq!(CanvasScope::new("p", Some("canvas-2".into())).screenshots(&state).count(), 2);
        assert_eq!(CanvasScope::new("missing", None).screenshots(&state).count(), 0);
    }

    #[test]
    fn test_state_json_layout() {
        let mut state = ProjectsState::new();
        state.current_project_id = Some("p".into());
        state.ensure_project("p").screenshots.push(Screenshot::path_only("projects/p/a.png", Some("canvas-1".into())));

        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["currentProjectId"], "p");
        let shot = &json["projects"]["p"]["screenshots"][0];
        assert_eq!(shot["path"], "projects/p/a.png");
        assert_eq!(shot["canvasId"], "canvas-1");
        assert!(shot.get("image").is_none());

        let back: ProjectsState = serde_json::from_value(json).unwrap();
        assert_eq!(back, state);
    }
}
