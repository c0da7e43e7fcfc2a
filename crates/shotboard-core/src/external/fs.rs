//! Local filesystem implementations of the external primitives.

use super::{
    CaptureSource, CapturedImage, Delivered, FileDelivery, FileListing, ListedFile, ListingQuery,
    uniquified_name,
};
use crate::error::{CaptureError, DeliveryError, ListingError};
use crate::paths::split_segments;
use crate::storage::BoxFuture;
use regex::Regex;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Upper bound on ` (n)` suffixes tried before giving up.
const MAX_UNIQUIFY_ATTEMPTS: usize = 10_000;

/// Split a proposed delivery path, refusing anything that could leave the base.
fn relative_segments(path: &str) -> Result<Vec<&str>, DeliveryError> {
    let segments = split_segments(path);
    let escapes = path.starts_with(['/', '\\'])
        || segments
            .iter()
            .any(|s| matches!(*s, "." | "..") || s.contains(':'));
    if segments.is_empty() || escapes {
        return Err(DeliveryError::new(path, "Path must be relative to the store"));
    }
    Ok(segments)
}

/// Writes captured images below a base directory, e.g. the downloads folder.
pub struct FsDelivery {
    base: PathBuf,
}

impl FsDelivery {
    pub fn new(base: PathBuf) -> Self {
        Self { base }
    }

    /// Deliver into the user's downloads directory.
    pub fn default_location() -> Option<Self> {
        dirs::download_dir().map(Self::new)
    }

    pub fn base_path(&self) -> &Path {
        &self.base
    }

    fn write_unique(&self, bytes: &[u8], path: &str) -> Result<String, DeliveryError> {
        let segments = relative_segments(path)?;
        let Some((file_name, parents)) = segments.split_last() else {
            return Err(DeliveryError::new(path, "Empty path"));
        };

        let dir = parents.iter().fold(self.base.clone(), |dir, s| dir.join(s));
        fs::create_dir_all(&dir).map_err(|e| {
            DeliveryError::new(path, format!("Failed to create {}: {}", dir.display(), e))
        })?;

        for attempt in 0..MAX_UNIQUIFY_ATTEMPTS {
            let name = if attempt == 0 {
                file_name.to_string()
            } else {
                uniquified_name(file_name, attempt)
            };
            let target = dir.join(&name);

            match OpenOptions::new().write(true).create_new(true).open(&target) {
                Ok(mut file) => {
                    file.write_all(bytes).map_err(|e| {
                        DeliveryError::new(path, format!("Failed to write {}: {}", target.display(), e))
                    })?;
                    let mut relative = parents.to_vec();
                    relative.push(&name);
                    return Ok(relative.join("/"));
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => {
                    return Err(DeliveryError::new(
                        path,
                        format!("Failed to create {}: {}", target.display(), e),
                    ));
                }
            }
        }

        Err(DeliveryError::new(path, "No free file name"))
    }
}

impl FileDelivery for FsDelivery {
    fn deliver<'a>(&'a self, bytes: &'a [u8], path: &'a str) -> BoxFuture<'a, Result<Delivered, DeliveryError>> {
        Box::pin(async move {
            let final_path = self.write_unique(bytes, path)?;
            Ok(Delivered { final_path })
        })
    }
}

enum Matcher {
    Regex(Regex),
    Substring(String),
}

impl Matcher {
    fn new(query: &ListingQuery) -> Result<Self, ListingError> {
        match query {
            ListingQuery::Pattern(pattern) => Regex::new(pattern)
                .map(Matcher::Regex)
                .map_err(|e| ListingError::UnsupportedQuery(e.to_string())),
            ListingQuery::Substring(needle) => Ok(Matcher::Substring(needle.to_lowercase())),
        }
    }

    fn matches(&self, path: &str) -> bool {
        match self {
            Matcher::Regex(re) => re.is_match(path),
            Matcher::Substring(needle) => path.to_lowercase().contains(needle.as_str()),
        }
    }
}

/// Lists the files below a base directory.
///
/// Reported paths are relative to the base and `/` separated.
pub struct FsListing {
    base: PathBuf,
}

impl FsListing {
    pub fn new(base: PathBuf) -> Self {
        Self { base }
    }

    pub fn default_location() -> Option<Self> {
        dirs::download_dir().map(Self::new)
    }

    fn walk(&self, matcher: &Matcher) -> Vec<ListedFile> {
        let mut files = Vec::new();
        for entry in WalkDir::new(&self.base).follow_links(false) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    log::debug!("Skipping unreadable entry: {}", e);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(&self.base) else {
                continue;
            };
            let path = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            if matcher.matches(&path) {
                files.push(ListedFile::new(path));
            }
        }
        files
    }
}

impl FileListing for FsListing {
    fn list<'a>(&'a self, query: &'a ListingQuery) -> BoxFuture<'a, Result<Vec<ListedFile>, ListingError>> {
        Box::pin(async move {
            let matcher = Matcher::new(query)?;
            if !self.base.exists() {
                return Ok(Vec::new());
            }
            Ok(self.walk(&matcher))
        })
    }
}

/// Captures by reading an image file, for hosts without a live screen.
pub struct FileCaptureSource {
    path: PathBuf,
    page_title: Option<String>,
    page_url: Option<String>,
}

impl FileCaptureSource {
    /// Capture `path`; the page title defaults to the file stem.
    pub fn new(path: PathBuf) -> Self {
        let page_title = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned());
        Self {
            path,
            page_title,
            page_url: None,
        }
    }

    pub fn with_page(mut self, title: Option<String>, url: Option<String>) -> Self {
        if title.is_some() {
            self.page_title = title;
        }
        self.page_url = url;
        self
    }
}

impl CaptureSource for FileCaptureSource {
    fn capture(&self) -> BoxFuture<'_, Result<CapturedImage, CaptureError>> {
        Box::pin(async move {
            let bytes = fs::read(&self.path).map_err(|e| match e.kind() {
                ErrorKind::NotFound => CaptureError::NoActiveSurface,
                ErrorKind::PermissionDenied => {
                    CaptureError::PermissionDenied(format!("{}: {}", self.path.display(), e))
                }
                _ => CaptureError::Failed(format!("{}: {}", self.path.display(), e)),
            })?;
            Ok(CapturedImage::new(bytes).with_page(self.page_title.clone(), self.page_url.clone()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paths::listing_pattern;
    use crate::testing::{block_on, png_bytes};
    use tempfile::tempdir;

    #[test]
    fn test_delivery_creates_project_directory() {
        let dir = tempdir().unwrap();
        let delivery = FsDelivery::new(dir.path().to_path_buf());

        let delivered = block_on(delivery.deliver(&png_bytes(1), "projects/p/shot.png")).unwrap();

        assert_eq!(delivered.final_path, "projects/p/shot.png");
        assert_eq!(fs::read(dir.path().join("projects/p/shot.png")).unwrap(), png_bytes(1));
    }

    #[test]
    fn test_delivery_uniquifies_instead_of_overwriting() {
        let dir = tempdir().unwrap();
        let delivery = FsDelivery::new(dir.path().to_path_buf());

        block_on(delivery.deliver(&png_bytes(1), "projects/p/shot.png")).unwrap();
        let second = block_on(delivery.deliver(&png_bytes(2), "projects/p/shot.png")).unwrap();
        let third = block_on(delivery.deliver(&png_bytes(3), "projects/p/shot.png")).unwrap();

        assert_eq!(second.final_path, "projects/p/shot (1).png");
        assert_eq!(third.final_path, "projects/p/shot (2).png");
        assert_eq!(fs::read(dir.path().join("projects/p/shot.png")).unwrap(), png_bytes(1));
    }

    #[test]
    fn test_delivery_rejects_escaping_paths() {
        let dir = tempdir().unwrap();
        let delivery = FsDelivery::new(dir.path().to_path_buf());

        for path in ["../x.png", "/etc/x.png", "projects/../../x.png", "C:/x.png", ""] {
            assert!(block_on(delivery.deliver(&png_bytes(1), path)).is_err(), "{path}");
        }
    }

    #[test]
    fn test_listing_by_pattern_and_substring() {
        let dir = tempdir().unwrap();
        let delivery = FsDelivery::new(dir.path().to_path_buf());
        block_on(delivery.deliver(&png_bytes(1), "projects/a/1.png")).unwrap();
        block_on(delivery.deliver(&png_bytes(2), "projects/b/2.png")).unwrap();
        block_on(delivery.deliver(&png_bytes(3), "other/c/3.png")).unwrap();

        let listing = FsListing::new(dir.path().to_path_buf());
        let query = ListingQuery::Pattern(listing_pattern("projects"));
        let mut paths: Vec<String> = block_on(listing.list(&query))
            .unwrap()
            .into_iter()
            .map(|f| f.path)
            .collect();
        paths.sort();
        assert_eq!(paths, vec!["projects/a/1.png", "projects/b/2.png"]);

        let broad = block_on(listing.list(&ListingQuery::Substring("PROJECTS".into()))).unwrap();
        assert_eq!(broad.len(), 2);
    }

    #[test]
    fn test_listing_invalid_pattern_is_unsupported() {
        let dir = tempdir().unwrap();
        let listing = FsListing::new(dir.path().to_path_buf());

        let result = block_on(listing.list(&ListingQuery::Pattern("(".into())));
        assert!(matches!(result, Err(ListingError::UnsupportedQuery(_))));
    }

    #[test]
    fn test_listing_missing_base_is_empty() {
        let dir = tempdir().unwrap();
        let listing = FsListing::new(dir.path().join("missing"));

        let files = block_on(listing.list(&ListingQuery::Substring("projects".into()))).unwrap();
        assert!(files.is_empty());
    }

    #[test]
    fn test_file_capture() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("Landing Page.png");
        fs::write(&path, png_bytes(9)).unwrap();

        let captured = block_on(FileCaptureSource::new(path).capture()).unwrap();
        assert_eq!(captured.bytes, png_bytes(9));
        assert_eq!(captured.page_title.as_deref(), Some("Landing Page"));
    }

    #[test]
    fn test_missing_capture_file_is_no_active_surface() {
        let dir = tempdir().unwrap();
        let source = FileCaptureSource::new(dir.path().join("missing.png"));

        assert_eq!(block_on(source.capture()), Err(CaptureError::NoActiveSurface));
    }
}
