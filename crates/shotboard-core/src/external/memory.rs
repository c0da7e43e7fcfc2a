//! In-memory implementations of the external primitives.
//!
//! Used by tests and by headless hosts. Each one can be told to misbehave the
//! way real primitives do: sandboxed stores that reject nested paths, listing
//! APIs that only understand some query styles, surfaces that take a while to
//! show a mounted image.

use super::{
    CaptureSource, CapturedImage, Delivered, FileDelivery, FileListing, ListedFile, ListingQuery,
    RenderSurface, uniquified_name,
};
use crate::error::{CaptureError, DeliveryError, ListingError, SurfaceError};
use crate::image::ImageRef;
use crate::paths::split_segments;
use crate::storage::BoxFuture;
use kurbo::Rect;
use regex::Regex;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Capture primitive that returns a fixed result.
pub struct StaticCapture {
    result: Result<CapturedImage, CaptureError>,
}

impl StaticCapture {
    pub fn new(image: CapturedImage) -> Self {
        Self { result: Ok(image) }
    }

    pub fn failing(error: CaptureError) -> Self {
        Self { result: Err(error) }
    }
}

impl CaptureSource for StaticCapture {
    fn capture(&self) -> BoxFuture<'_, Result<CapturedImage, CaptureError>> {
        Box::pin(async move { self.result.clone() })
    }
}

#[derive(Debug, Clone)]
struct StoredFile {
    bytes: Vec<u8>,
    exists: bool,
}

/// An external store kept in memory, supporting delivery and listing.
///
/// Listed paths are reported below `prefix`, the way a downloads API reports
/// absolute paths.
#[derive(Default)]
pub struct MemoryExternalStore {
    prefix: String,
    files: Mutex<BTreeMap<String, StoredFile>>,
    queries: Mutex<Vec<ListingQuery>>,
    reject_nested: AtomicBool,
    fail_delivery: AtomicBool,
    pattern_unsupported: AtomicBool,
    listing_unavailable: AtomicBool,
}

impl MemoryExternalStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report listed paths below `prefix`, e.g. `/home/me/Downloads`.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into().trim_end_matches(['/', '\\']).to_string(),
            ..Self::default()
        }
    }

    /// Reject deliveries into subdirectories of the root, like a sandboxed store.
    pub fn set_reject_nested(&self, reject: bool) {
        self.reject_nested.store(reject, Ordering::SeqCst);
    }

    /// Fail every delivery.
    pub fn set_fail_delivery(&self, fail: bool) {
        self.fail_delivery.store(fail, Ordering::SeqCst);
    }

    /// Refuse [`ListingQuery::Pattern`] queries.
    pub fn set_pattern_unsupported(&self, unsupported: bool) {
        self.pattern_unsupported.store(unsupported, Ordering::SeqCst);
    }

    /// Fail every listing query.
    pub fn set_listing_unavailable(&self, unavailable: bool) {
        self.listing_unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Add a file created outside the system.
    pub fn insert(&self, path: &str, bytes: Vec<u8>) {
        lock(&self.files).insert(path.to_string(), StoredFile { bytes, exists: true });
    }

    /// Keep the entry but report it as no longer existing.
    pub fn mark_missing(&self, path: &str) {
        if let Some(file) = lock(&self.files).get_mut(path) {
            file.exists = false;
        }
    }

    pub fn contains(&self, path: &str) -> bool {
        lock(&self.files).contains_key(path)
    }

    #[cfg(test)]
    pub fn bytes(&self, path: &str) -> Option<Vec<u8>> {
        lock(&self.files).get(path).map(|f| f.bytes.clone())
    }

    /// Stored paths, in order.
    pub fn paths(&self) -> Vec<String> {
        lock(&self.files).keys().cloned().collect()
    }

    /// Queries received so far, in order.
    pub fn queries(&self) -> Vec<ListingQuery> {
        lock(&self.queries).clone()
    }

    fn listed_path(&self, path: &str) -> String {
        if self.prefix.is_empty() {
            path.to_string()
        } else {
            format!("{}/{}", self.prefix, path)
        }
    }

    fn store_unique(&self, bytes: &[u8], path: &str) -> Result<String, DeliveryError> {
        if self.fail_delivery.load(Ordering::SeqCst) {
            return Err(DeliveryError::new(path, "Delivery unavailable"));
        }
        let segments = split_segments(path);
        let Some((file_name, parents)) = segments.split_last() else {
            return Err(DeliveryError::new(path, "Empty path"));
        };
        if self.reject_nested.load(Ordering::SeqCst) && parents.len() > 1 {
            return Err(DeliveryError::new(path, "Nested paths are not allowed"));
        }

        let dir = parents.join("/");
        let mut files = lock(&self.files);
        let mut attempt = 0;
        loop {
            let name = if attempt == 0 {
                file_name.to_string()
            } else {
                uniquified_name(file_name, attempt)
            };
            let candidate = if dir.is_empty() { name } else { format!("{}/{}", dir, name) };
            if !files.contains_key(&candidate) {
                files.insert(
                    candidate.clone(),
                    StoredFile {
                        bytes: bytes.to_vec(),
                        exists: true,
                    },
                );
                return Ok(candidate);
            }
            attempt += 1;
        }
    }

    fn matching(&self, query: &ListingQuery) -> Result<Vec<ListedFile>, ListingError> {
        lock(&self.queries).push(query.clone());
        if self.listing_unavailable.load(Ordering::SeqCst) {
            return Err(ListingError::Failed("Listing unavailable".to_string()));
        }

        let matches: Box<dyn Fn(&str) -> bool> = match query {
            ListingQuery::Pattern(pattern) => {
                if self.pattern_unsupported.load(Ordering::SeqCst) {
                    return Err(ListingError::UnsupportedQuery("pattern".to_string()));
                }
                let re = Regex::new(pattern).map_err(|e| ListingError::UnsupportedQuery(e.to_string()))?;
                Box::new(move |path| re.is_match(path))
            }
            ListingQuery::Substring(needle) => {
                let needle = needle.to_lowercase();
                Box::new(move |path| path.to_lowercase().contains(&needle))
            }
        };

        Ok(lock(&self.files)
            .iter()
            .map(|(path, file)| ListedFile {
                path: self.listed_path(path),
                exists: file.exists,
            })
            .filter(|listed| matches(&listed.path))
            .collect())
    }
}

impl FileDelivery for MemoryExternalStore {
    fn deliver<'a>(&'a self, bytes: &'a [u8], path: &'a str) -> BoxFuture<'a, Result<Delivered, DeliveryError>> {
        Box::pin(async move {
            let final_path = self.store_unique(bytes, path)?;
            Ok(Delivered { final_path })
        })
    }
}

impl FileListing for MemoryExternalStore {
    fn list<'a>(&'a self, query: &'a ListingQuery) -> BoxFuture<'a, Result<Vec<ListedFile>, ListingError>> {
        Box::pin(async move { self.matching(query) })
    }
}

/// A drawing surface kept in memory.
///
/// Mounted images only become present once [`settle`](Self::settle) runs,
/// unless the surface was created with [`immediate`](Self::immediate).
#[derive(Default)]
pub struct MemorySurface {
    immediate: bool,
    mounted: Mutex<Vec<(ImageRef, Rect)>>,
    pending: Mutex<Vec<ImageRef>>,
    present: Mutex<HashSet<ImageRef>>,
}

impl MemorySurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// A surface on which mounted images are present right away.
    pub fn immediate() -> Self {
        Self {
            immediate: true,
            ..Self::default()
        }
    }

    /// Finish mounting: every pending image becomes present.
    pub fn settle(&self) {
        let pending = std::mem::take(&mut *lock(&self.pending));
        lock(&self.present).extend(pending);
    }

    /// Remove an image the way a user deleting it would.
    pub fn remove(&self, image: &ImageRef) -> bool {
        lock(&self.pending).retain(|p| p != image);
        lock(&self.present).remove(image)
    }

    /// Every mount call so far, with its placement.
    pub fn mounted(&self) -> Vec<(ImageRef, Rect)> {
        lock(&self.mounted).clone()
    }
}

impl RenderSurface for MemorySurface {
    fn mount(&self, image: &ImageRef, bounds: Rect) -> Result<(), SurfaceError> {
        if image.is_empty() {
            return Err(SurfaceError::Rejected("empty image".to_string()));
        }
        lock(&self.mounted).push((image.clone(), bounds));
        if self.immediate {
            lock(&self.present).insert(image.clone());
        } else {
            lock(&self.pending).push(image.clone());
        }
        Ok(())
    }

    fn present_identities(&self) -> HashSet<ImageRef> {
        lock(&self.present).clone()
    }
}
