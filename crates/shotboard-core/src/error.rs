//! Error types for the capture pipeline and the external primitives.

use crate::storage::StorageError;
use thiserror::Error;

/// Errors from the screen-capture primitive.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptureError {
    #[error("No active surface to capture")]
    NoActiveSurface,
    #[error("Capture permission denied: {0}")]
    PermissionDenied(String),
    #[error("Capture failed: {0}")]
    Failed(String),
}

/// Errors from the file-delivery primitive.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Delivery to {path} failed: {reason}")]
pub struct DeliveryError {
    /// Path the delivery was attempted at.
    pub path: String,
    pub reason: String,
}

impl DeliveryError {
    pub fn new(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Errors from the listing primitive.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ListingError {
    /// The primitive does not understand this style of query.
    #[error("Listing query not supported: {0}")]
    UnsupportedQuery(String),
    #[error("Listing failed: {0}")]
    Failed(String),
}

/// Errors from the rendering surface.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SurfaceError {
    #[error("Surface rejected image: {0}")]
    Rejected(String),
}

/// Errors surfaced at the capture pipeline boundary.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error(transparent)]
    Delivery(#[from] DeliveryError),
    /// The image reached the external store but the record was not saved.
    #[error("Failed to persist screenshot: {0}")]
    Persist(#[from] StorageError),
}

/// Errors from explicit project and canvas operations.
#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("Project not found: {0}")]
    ProjectNotFound(String),
    #[error("Canvas not found: {0}")]
    CanvasNotFound(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
}
