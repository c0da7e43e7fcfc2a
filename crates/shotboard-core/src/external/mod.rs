//! Interfaces to the collaborators outside the core.
//!
//! The capture primitive produces image bytes, the delivery primitive writes
//! them into the external store, the listing primitive reports what the
//! external store holds, and the rendering surface shows images and reports
//! which ones are still present.

mod fs;
mod memory;

pub use fs::{FileCaptureSource, FsDelivery, FsListing};
pub use memory::{MemoryExternalStore, MemorySurface, StaticCapture};

use crate::error::{CaptureError, DeliveryError, ListingError, SurfaceError};
use crate::image::ImageRef;
use crate::storage::BoxFuture;
use kurbo::Rect;
use std::collections::HashSet;

/// Image bytes plus the provenance of the captured page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedImage {
    pub bytes: Vec<u8>,
    pub page_title: Option<String>,
    pub page_url: Option<String>,
}

impl CapturedImage {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            page_title: None,
            page_url: None,
        }
    }

    pub fn with_page(mut self, title: Option<String>, url: Option<String>) -> Self {
        self.page_title = title;
        self.page_url = url;
        self
    }
}

/// Screen-capture primitive.
pub trait CaptureSource: Send + Sync {
    /// Capture the active viewable surface.
    fn capture(&self) -> BoxFuture<'_, Result<CapturedImage, CaptureError>>;
}

/// Outcome of a successful delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivered {
    /// Relative path the file actually landed at.
    pub final_path: String,
}

/// File-delivery primitive.
///
/// Implementations must never overwrite: when a file already exists at the
/// proposed path they pick a unique name instead and report it in
/// [`Delivered::final_path`].
pub trait FileDelivery: Send + Sync {
    fn deliver<'a>(&'a self, bytes: &'a [u8], path: &'a str) -> BoxFuture<'a, Result<Delivered, DeliveryError>>;
}

/// Query styles a listing primitive may support.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListingQuery {
    /// Regular expression matched against the full path.
    Pattern(String),
    /// Case-insensitive substring of the path.
    Substring(String),
}

/// One entry reported by a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedFile {
    pub path: String,
    /// False when the store remembers the entry but the file is gone.
    pub exists: bool,
}

impl ListedFile {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            exists: true,
        }
    }
}

/// Listing primitive. Results may be partial or stale.
pub trait FileListing: Send + Sync {
    fn list<'a>(&'a self, query: &'a ListingQuery) -> BoxFuture<'a, Result<Vec<ListedFile>, ListingError>>;
}

/// A live drawing surface.
pub trait RenderSurface: Send + Sync {
    /// Place an image within `bounds`.
    fn mount(&self, image: &ImageRef, bounds: Rect) -> Result<(), SurfaceError>;

    /// Identities of the images currently on the surface.
    fn present_identities(&self) -> HashSet<ImageRef>;
}

/// The `n`th alternative for a taken file name: `shot.png` becomes `shot (1).png`.
pub(crate) fn uniquified_name(file_name: &str, n: usize) -> String {
    match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{} ({}).{}", stem, n, ext),
        _ => format!("{} ({})", file_name, n),
    }
}
