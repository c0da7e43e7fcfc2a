//! Session-scoped handoff of freshly captured images.
//!
//! The scanner may record a new file as a path-only screenshot before (or
//! instead of) the capture pipeline recording it with its pixels. The last
//! capture per project is parked here so a view opened right after the
//! capture can hydrate that record without reading the file back.

use crate::image::ImageRef;
use crate::project::ProjectsState;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// How long a parked capture stays available.
pub const DEFAULT_HANDOFF_TTL: Duration = Duration::from_secs(10 * 60);

/// A capture waiting to be matched with its record.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingCapture {
    /// Path the capture was delivered to.
    pub path: String,
    pub image: ImageRef,
    stashed_at: Instant,
}

/// Last capture per project, kept in memory for this session only.
pub struct SessionHandoff {
    entries: Mutex<HashMap<String, PendingCapture>>,
    ttl: Duration,
}

impl Default for SessionHandoff {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionHandoff {
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_HANDOFF_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, PendingCapture>> {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let ttl = self.ttl;
        entries.retain(|_, pending| pending.stashed_at.elapsed() < ttl);
        entries
    }

    /// Park the latest capture for `project_id`, replacing any earlier one.
    pub fn stash(&self, project_id: &str, path: &str, image: ImageRef) {
        self.entries().insert(
            project_id.to_string(),
            PendingCapture {
                path: path.to_string(),
                image,
                stashed_at: Instant::now(),
            },
        );
    }

    pub fn peek(&self, project_id: &str) -> Option<PendingCapture> {
        self.entries().get(project_id).cloned()
    }

    pub fn take(&self, project_id: &str) -> Option<PendingCapture> {
        self.entries().remove(project_id)
    }

    /// Hydrate the parked capture's record in `state`.
    ///
    /// Returns true if a path-only record was filled in. The parked capture is
    /// dropped once its record is found, hydrated or not; it is kept while the
    /// record does not exist yet.
    pub fn hydrate(&self, state: &mut ProjectsState, project_id: &str) -> bool {
        let mut entries = self.entries();
        let Some(pending) = entries.get(project_id) else {
            return false;
        };
        let Some(shot) = state
            .project_mut(project_id)
            .and_then(|p| p.screenshot_by_path_mut(&pending.path))
        else {
            return false;
        };

        let hydrated = shot.hydrate(pending.image.clone());
        entries.remove(project_id);
        if hydrated {
            log::debug!("Hydrated {} from session handoff", shot.path);
        }
        hydrated
    }
}
