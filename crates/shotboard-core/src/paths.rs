//! Path derivation for the external store.
//!
//! Every path handed to the external store is relative and `/` separated:
//! `root/<project>/<file>` for normal captures, `root/<file>` for the
//! flattened fallback.

use chrono::{DateTime, Utc};

/// Root directory name used when none is configured.
pub const DEFAULT_ROOT: &str = "projects";

/// Title used for captures without a page title.
pub const DEFAULT_TITLE: &str = "page";

/// Maximum length of the title part of a file name.
pub const MAX_SLUG_LEN: usize = 60;

/// Extension forced onto every captured image.
pub const IMAGE_EXTENSION: &str = "png";

/// Prefix of synthesized project ids.
pub const PROJECT_ID_PREFIX: &str = "project_";

/// Split a path on either separator, dropping empty segments.
pub fn split_segments(path: &str) -> Vec<&str> {
    path.split(['/', '\\']).filter(|s| !s.is_empty()).collect()
}

fn has_drive_prefix(path: &str) -> bool {
    let mut chars = path.chars();
    matches!(
        (chars.next(), chars.next()),
        (Some(letter), Some(':')) if letter.is_ascii_alphabetic()
    )
}

/// Whether a segment may appear in a path we write.
fn is_plain_segment(segment: &str) -> bool {
    !matches!(segment, "." | ".." | "~") && !segment.contains(':')
}

/// Sanitize the configured root so it can never point outside the store.
///
/// Absolute, home-relative and drive-letter paths collapse to their final
/// segment. `.`/`..` segments are dropped. An empty result falls back to
/// [`DEFAULT_ROOT`].
pub fn normalize_root(raw: Option<&str>) -> String {
    let trimmed = raw.unwrap_or_default().trim();
    let anchored = trimmed.starts_with(['~', '/', '\\']) || has_drive_prefix(trimmed);

    let mut segments: Vec<&str> = split_segments(trimmed)
        .into_iter()
        .filter(|s| is_plain_segment(s))
        .collect();
    if anchored {
        segments = segments.pop().into_iter().collect();
    }

    if segments.is_empty() {
        DEFAULT_ROOT.to_string()
    } else {
        segments.join("/")
    }
}

/// Sortable timestamp token, e.g. `2024-05-01_09-30-12-345`.
pub fn timestamp_token(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d_%H-%M-%S-%3f").to_string()
}

/// Synthesize an id for an implicitly created project.
pub fn new_project_id(at: DateTime<Utc>) -> String {
    format!("{}{}", PROJECT_ID_PREFIX, timestamp_token(at))
}

/// Turn a page title into a file-name-safe slug.
///
/// Each run of characters outside `[A-Za-z0-9_-]` becomes a single `_`.
pub fn title_slug(title: Option<&str>) -> String {
    let title = title.filter(|t| !t.is_empty()).unwrap_or(DEFAULT_TITLE);

    let mut slug = String::with_capacity(title.len());
    let mut in_run = false;
    for c in title.chars() {
        if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
            slug.push(c);
            in_run = false;
        } else if !in_run {
            slug.push('_');
            in_run = true;
        }
    }

    let slug: String = slug.chars().take(MAX_SLUG_LEN).collect();
    if slug.is_empty() {
        DEFAULT_TITLE.to_string()
    } else {
        slug
    }
}

/// File name for a capture: `<slug>_<timestamp>.png`.
pub fn screenshot_file_name(title: Option<&str>, at: DateTime<Utc>) -> String {
    format!(
        "{}_{}.{}",
        title_slug(title),
        timestamp_token(at),
        IMAGE_EXTENSION
    )
}

/// Directory segment for a project id.
pub fn path_segment(id: &str) -> String {
    let safe: String = id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if safe.is_empty() { "_".to_string() } else { safe }
}

/// `root/<project>/<file>`.
pub fn project_path(root: &str, project_id: &str, file_name: &str) -> String {
    format!("{}/{}/{}", root, path_segment(project_id), file_name)
}

/// `root/<file>`, used when the store rejects nested paths.
pub fn flat_path(root: &str, file_name: &str) -> String {
    format!("{}/{}", root, file_name)
}

/// Regex a listing primitive can use to find files under `root`.
pub fn listing_pattern(root: &str) -> String {
    let escaped: Vec<String> = split_segments(root).into_iter().map(regex::escape).collect();
    format!(
        r"(?i)(?:^|[\\/]){}(?:[\\/].+)?$",
        escaped.join(r"[\\/]")
    )
}

/// A listed file attributed to a project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatedFile {
    pub project_id: String,
    /// Canonical relative path, `root/<project>/<rest>`.
    pub path: String,
}

/// Attribute a listed path to a project.
///
/// The segment right after the root is the project id. Paths without the
/// root, or with nothing below the project segment, are not attributable.
pub fn locate_under_root(path: &str, root: &str) -> Option<LocatedFile> {
    let parts = split_segments(path);
    let root_parts = split_segments(root);
    if root_parts.is_empty() || parts.len() <= root_parts.len() {
        return None;
    }

    let start = parts.windows(root_parts.len()).position(|window| {
        window
            .iter()
            .zip(&root_parts)
            .all(|(a, b)| a.eq_ignore_ascii_case(b))
    })?;

    let rest = &parts[start + root_parts.len()..];
    if rest.len() < 2 {
        return None;
    }

    Some(LocatedFile {
        project_id: rest[0].to_string(),
        path: format!("{}/{}", root_parts.join("/"), rest.join("/")),
    })
}
